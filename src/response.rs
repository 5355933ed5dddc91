use crate::{exception::Exception, param::*, request::Request};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};

use std::{
    ffi::OsStr,
    fs::File,
    io::{self, Read, Write},
    path::Path,
    str,
};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            content: None,
        }
    }

    /// 由SSR管线产出的HTML构建响应。状态码由渲染结果决定
    pub fn from_html(
        code: u16,
        html: &str,
        request: &Request,
        id: u128,
    ) -> Self {
        let accept_encoding = request.accept_encoding().to_vec();
        let headonly = request.method() == HttpRequestMethod::Head;
        let mut response = Self::new();
        response.content_encoding = match headonly {
            true => None,
            false => decide_encoding(&accept_encoding),
        };
        match response.content_encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => debug!("[ID{}]不进行压缩", id),
        };
        debug!("[ID{}]开始压缩HTML，原始大小: {} bytes", id, html.len());
        let content_compressed = match compress(Vec::from(html), response.content_encoding) {
            Ok(c) => c,
            Err(e) => {
                error!("[ID{}]压缩HTML失败: {}，返回未压缩内容", id, e);
                response.content_encoding = None;
                Vec::from(html)
            }
        };
        response.content_length = content_compressed.len() as u64;
        response.content_type = Some("text/html;charset=utf-8".to_string());
        response.content = match headonly {
            true => None,
            false => Some(Bytes::from(content_compressed)),
        };
        response
            .set_date()
            .set_code(code)
            .set_version()
            .set_server_name()
            .to_owned()
    }

    /// 由前端构建产物（静态资源）构建响应
    pub fn from_asset(path: &str, request: &Request, id: u128) -> Result<Self, Exception> {
        let accept_encoding = request.accept_encoding().to_vec();
        let headonly = request.method() == HttpRequestMethod::Head;
        let mut response = Self::new();

        let extension = match Path::new(path).extension() {
            Some(e) => e,
            None => {
                error!("[ID{}]无法确定请求路径{}的文件扩展名", id, path);
                return Err(Exception::AssetNotFound);
            }
        };
        let mime = get_mime(extension);
        debug!("[ID{}]MIME类型: {}", id, mime);

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return Err(Exception::AssetNotFound),
        };
        let mut contents = Vec::new();
        if let Err(e) = file.read_to_end(&mut contents) {
            error!("[ID{}]无法读取文件{}。错误：{}", id, path, e);
            return Err(Exception::AssetNotFound);
        }

        let skip_compression = should_skip_compression(mime);
        response.content_encoding = match headonly || skip_compression {
            true => None,
            false => decide_encoding(&accept_encoding),
        };
        let contents = match compress(contents.clone(), response.content_encoding) {
            Ok(c) => c,
            Err(e) => {
                error!("[ID{}]压缩文件{}失败: {}，返回未压缩内容", id, path, e);
                response.content_encoding = None;
                contents
            }
        };

        response.content_length = contents.len() as u64;
        response.content_type = Some(mime.to_string());
        response.content = match headonly {
            true => None,
            false => Some(Bytes::from(contents)),
        };
        Ok(response
            .set_date()
            .set_code(200)
            .set_version()
            .set_server_name()
            .to_owned())
    }

    /// 兜底的纯状态码响应（请求解析失败、渲染不可恢复时使用）
    fn from_status_code(code: u16, accept_encoding: Vec<HttpEncoding>, id: u128) -> Self {
        let mut response = Self::new();
        response.content_encoding = decide_encoding(&accept_encoding);
        match response.content_encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => debug!("[ID{}]不进行压缩", id),
        };
        let description = match STATUS_CODES.get(&code) {
            Some(d) => *d,
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                panic!();
            }
        };
        let content = format!(
            r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>{}</title></head><body><h1>{}</h1><p>{}</p></body></html>"#,
            code, code, description
        );
        let content_compressed = compress(content.into_bytes(), response.content_encoding).unwrap();
        let bytes = Bytes::from(content_compressed);
        response.content_length = bytes.len() as u64;
        response.content = Some(bytes);
        response.content_type = Some("text/html;charset=utf-8".to_string());
        response.set_code(code);
        response
    }

    fn set_date(&mut self) -> &mut Self {
        self.date = Utc::now();
        self
    }

    fn set_version(&mut self) -> &mut Self {
        self.version = HttpVersion::V1_1;
        self
    }

    fn set_server_name(&mut self) -> &mut Self {
        self.server_name = SERVER_NAME.to_string();
        self
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&information) => information.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                panic!();
            }
        };
        self
    }

    pub fn response_404(request: &Request, id: u128) -> Self {
        let accept_encoding = request.accept_encoding().to_vec();
        Self::from_status_code(404, accept_encoding, id)
            .set_date()
            .set_code(404)
            .set_version()
            .set_server_name()
            .to_owned()
    }

    pub fn response_500(request: &Request, id: u128) -> Self {
        let accept_encoding = request.accept_encoding().to_vec();
        Self::from_status_code(500, accept_encoding, id)
            .set_date()
            .set_code(500)
            .set_version()
            .set_server_name()
            .to_owned()
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;

        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.content_encoding {
                Some(e) => ["Content-encoding: ", &e.to_string(), CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            CRLF,
        ]
        .concat();
        [
            header.as_bytes(),
            match &self.content {
                Some(c) => c,
                None => b"",
            },
        ]
        .concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        let compressed_size = compressed.len();
        let ratio = if original_size > 0 {
            ((original_size as i64 - compressed_size as i64) as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
            mode, original_size, compressed_size, ratio
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/avif",
        "image/x-icon",
        "font/woff",
        "font/woff2",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

fn decide_encoding(accept_encoding: &Vec<HttpEncoding>) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else {
        None
    }
}

fn get_mime(extension: &OsStr) -> &str {
    let extension = match extension.to_str() {
        Some(e) => e,
        None => {
            error!("无法将&OsStr转换为&str类型");
            return "application/octet-stream";
        }
    };
    match MIME_TYPES.get(extension) {
        Some(v) => v,
        None => "application/octet-stream",
    }
}
