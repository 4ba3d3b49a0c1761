//! The local HTTP server's request handler: serves a directory of files
//! (the HLS playlist and its segments) with byte-range support, nothing
//! else.

use std::path::{Path, PathBuf};

use http11::{Body, FileBody, Request, Response};

pub fn handler(root: PathBuf) -> impl Fn(&Request) -> Response + Send + Sync {
    move |req: &Request| -> Response {
        if !req.method.eq_ignore_ascii_case("GET") && !req.method.eq_ignore_ascii_case("HEAD") {
            return Response::new(405);
        }

        let path = match resolve(&root, &req.path) {
            Some(path) => path,
            None => return Response::new(404),
        };

        let file = match FileBody::open(&path) {
            Ok(file) => file,
            Err(_) => return Response::new(404),
        };

        let mut resp = req.make_response();
        if let Some(content_type) = file.content_type() {
            resp.set_content_type(content_type);
        }
        resp.set_body(Body::File(file));
        resp.set_ranges(req.ranges().to_vec());
        resp
    }
}

/// Map a request path to a file under `root`, rejecting anything that
/// would climb out of it (`..` segments).
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let request_path = request_path.split('?').next().unwrap_or(request_path);
    let relative = request_path.trim_start_matches('/');
    if relative.split('/').any(|seg| seg == "..") {
        return None;
    }
    let candidate = root.join(relative);
    if candidate.is_file() {
        Some(candidate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal() {
        assert!(resolve(Path::new("/srv/hls"), "/../../etc/passwd").is_none());
    }
}
