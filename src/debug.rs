extern crate image;
extern crate pretty_bytes;
extern crate querystring;
extern crate std;
extern crate tiny_http;

use crate::result;

type Response = tiny_http::Response<std::io::Cursor<Vec<u8>>>;

/// What the status page reports about the running dashboard.
pub struct DebugStatus<'a> {
    pub version: Option<&'a str>,
    pub source: &'a str,
    pub last_fetch: &'a str,
    pub lines: Vec<String>,
}

/// The debug page, served from the render loop itself: `poll` answers
/// whatever requests are already waiting and returns straight away.
pub struct DebugServer {
    server: tiny_http::Server,
    log_dir: std::path::PathBuf,
}

impl DebugServer {
    pub fn start(port: &str) -> result::DashResult<DebugServer> {
        let address = format!("0.0.0.0:{}", port);
        let server = tiny_http::Server::http(&address)
            .map_err(|err| result::make_error(&format!("Binding debug server to {}: {}", address, err)))?;
        info!("Running debug HTTP server on port {}", port);
        return Ok(DebugServer{
            server: server,
            log_dir: std::path::PathBuf::from("./"),
        });
    }

    pub fn poll(&self, status: &DebugStatus, frame: &image::RgbImage) {
        loop {
            let request = match self.server.try_recv() {
                Ok(Some(request)) => request,
                Ok(None) => return,
                Err(err) => {
                    warn!("Debug server receive failed: {}", err);
                    return;
                },
            };

            let url = request.url().to_string();
            let (path, query) = match url.find('?') {
                Some(split) => (&url[..split], &url[split + 1..]),
                None => (url.as_str(), ""),
            };

            let response = match (request.method(), path) {
                (&tiny_http::Method::Get, "/") => main_page(status, &self.log_dir),
                (&tiny_http::Method::Get, "/current_image") => current_image(frame),
                (&tiny_http::Method::Get, "/dumplog") => dump_log(query, &self.log_dir),
                (_, _) => Ok(not_found()),
            };

            let response = response.unwrap_or_else(|err| {
                warn!("Debug request for {} failed: {}", url, err);
                return not_found();
            });

            if let Err(err) = request.respond(response) {
                warn!("Debug response failed: {}", err);
            }
        }
    }
}

fn with_content_type(response: Response, content_type: &str) -> Response {
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        Ok(header) => return response.with_header(header),
        Err(_) => return response,
    }
}

fn not_found() -> Response {
    return with_content_type(
        tiny_http::Response::from_string("<h1>404</h1><p>Not found!<p>"),
        "text/html; charset=utf-8")
        .with_status_code(tiny_http::StatusCode(404));
}

fn which_log(query: &str) -> Option<String> {
    let params = querystring::querify(query);

    for (k, v) in params {
        if k == "log" && v.ends_with(".log") && !v.contains('/') && !v.contains("..") {
            return Some(v.to_string());
        }
    }

    return None;
}

fn current_image(frame: &image::RgbImage) -> result::DashResult<Response> {
    return Ok(with_content_type(tiny_http::Response::from_data(encode_png(frame)?), "image/png"));
}

pub fn encode_png(frame: &image::RgbImage) -> result::DashResult<Vec<u8>> {
    let mut png = std::io::Cursor::new(Vec::new());
    frame.write_to(&mut png, image::ImageFormat::Png)?;
    return Ok(png.into_inner());
}

fn dump_log(query: &str, log_dir: &std::path::Path) -> result::DashResult<Response> {
    let filename = which_log(query)
        .ok_or(result::make_error("missing or invalid log parameter"))?;

    let contents = std::fs::read_to_string(log_dir.join(filename))?;
    return Ok(with_content_type(tiny_http::Response::from_string(contents), "text/plain; charset=utf-8"));
}

fn main_page(status: &DebugStatus, log_dir: &std::path::Path) -> result::DashResult<Response> {
    let body = main_page_body(status, log_dir)?;
    return Ok(with_content_type(tiny_http::Response::from_string(body), "text/html; charset=utf-8"));
}

fn main_page_body(status: &DebugStatus, log_dir: &std::path::Path) -> result::DashResult<String> {
    let mut body = format!("<html><body><h1>MetroDash Debug Server</h1><div>Version {}</div>",
                           status.version.unwrap_or("[unknown]"));

    body.push_str(&format!("<div><h2>Data</h2><div>Source: {}</div><div>Last fetch: {}</div><ol>",
                           escape(status.source), escape(status.last_fetch)));
    for line in &status.lines {
        body.push_str(&format!("<li><code>{}</code></li>", escape(line)));
    }
    body.push_str("</ol></div>");

    body.push_str("<div><h2>Current image</h2><img style='border: 1px solid black; image-rendering: pixelated; width: 512px;' src='/current_image' /></div>");

    body.push_str("<div><h2>Log files</h2><ul>");
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.to_string_lossy().ends_with(".log") {
            continue;
        }
        let filename = match path.file_name().and_then(|f| f.to_str()) {
            Some(filename) => filename.to_string(),
            None => continue,
        };
        body.push_str(&log_link(&filename, entry.metadata()?.len()));
    }
    body.push_str("</ul></div>");

    body.push_str("</body></html>");

    return Ok(body);
}

fn log_link(filename: &str, size: u64) -> String {
    let filename = escape(filename);
    return format!("<li><a href='/dumplog?log={}'>{}</a> [{}]</li>",
                   filename, filename, pretty_bytes::converter::convert(size as f64));
}

fn escape(text: &str) -> String {
    return text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
        .replace('\'', "&#39;").replace('"', "&quot;");
}

#[cfg(test)]
mod tests {
    #[test]
    fn which_log_accepts_only_log_files() {
        assert_eq!(Some("metrodash_rCURRENT.log".to_string()), super::which_log("log=metrodash_rCURRENT.log"));
        assert_eq!(None, super::which_log("log=/etc/passwd"));
        assert_eq!(None, super::which_log("log=../secret.log"));
        assert_eq!(None, super::which_log("file=metrodash.log"));
        assert_eq!(None, super::which_log(""));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!("METRO: A&amp;B &lt;1 MIN", super::escape("METRO: A&B <1 MIN"));
    }

    #[test]
    fn log_links_are_escaped() {
        let link = super::log_link("x'><script>.log", 2048);
        assert!(link.starts_with("<li><a href='/dumplog?log=x&#39;&gt;&lt;script&gt;.log'>"));
        assert!(!link.contains("<script>"));
    }

    #[test]
    fn main_page_lists_lines() {
        let status = super::DebugStatus{
            version: Some("1.2"),
            source: "live",
            last_fetch: "updated",
            lines: vec!["METRO: ROSEMONT • 8 MIN".to_string()],
        };
        let body = super::main_page_body(&status, std::path::Path::new("testdata")).expect("main page");
        assert!(body.contains("Version 1.2"));
        assert!(body.contains("METRO: ROSEMONT • 8 MIN"));
    }

    #[test]
    fn current_image_is_png() {
        let frame = image::RgbImage::new(64, 32);
        let body = super::encode_png(&frame).expect("png");
        assert_eq!(&[0x89, b'P', b'N', b'G'], &body[0..4]);
    }
}
