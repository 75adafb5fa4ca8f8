//! MIME type detection for preview responses.

use std::path::Path;

pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const TYPESCRIPT: &str = "text/typescript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const SOURCE_MAP: &str = "application/json";
    pub const WASM: &str = "application/wasm";
    pub const OCTET_STREAM: &str = "application/octet-stream";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
}

/// Guess MIME type from file extension.
pub fn from_path(path: &Path) -> &'static str {
    from_extension(path.extension().and_then(|e| e.to_str()))
}

pub fn from_extension(ext: Option<&str>) -> &'static str {
    let Some(ext) = ext else {
        return types::OCTET_STREAM;
    };
    match ext.to_ascii_lowercase().as_str() {
        "js" | "mjs" | "cjs" => types::JAVASCRIPT,
        "ts" | "mts" | "tsx" => types::TYPESCRIPT,
        "html" | "htm" => types::HTML,
        "css" => types::CSS,
        "json" => types::JSON,
        "map" => types::SOURCE_MAP,
        "txt" => types::PLAIN,
        "wasm" => types::WASM,
        "png" => types::PNG,
        "jpg" | "jpeg" => types::JPEG,
        "gif" => types::GIF,
        "webp" => types::WEBP,
        "svg" => types::SVG,
        "ico" => types::ICO,
        "woff" => types::WOFF,
        "woff2" => types::WOFF2,
        _ => types::OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_is_javascript() {
        assert_eq!(from_path(Path::new("index.js")), types::JAVASCRIPT);
        assert_eq!(from_path(Path::new("assets/Logo.PNG")), types::PNG);
    }

    #[test]
    fn unknown_or_missing_extension_is_binary() {
        assert_eq!(from_path(Path::new("LICENSE")), types::OCTET_STREAM);
        assert_eq!(from_path(Path::new("data.bin")), types::OCTET_STREAM);
    }
}
