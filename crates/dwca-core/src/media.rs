//! Media link helpers: splitting associated media lists and guessing formats

use std::fmt;

/// DCMI type of a media resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    StillImage,
    Sound,
    MovingImage,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::StillImage => "StillImage",
            MediaType::Sound => "Sound",
            MediaType::MovingImage => "MovingImage",
        }
    }

    /// Media type for a MIME type such as "image/jpeg"
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split('/').next()? {
            "image" => Some(MediaType::StillImage),
            "audio" => Some(MediaType::Sound),
            "video" => Some(MediaType::MovingImage),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIME format and media type guessed for a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub format: String,
    pub media_type: Option<MediaType>,
}

/// Split an associated media value into individual links
///
/// Example: "http://x/a.jpg | http://x/b.mp4" -> ["http://x/a.jpg", "http://x/b.mp4"]
pub fn split_media_urls(value: &str, delimiters: &[char]) -> Vec<String> {
    value
        .split(|c: char| delimiters.contains(&c))
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// Guess the format of a media link from its file extension
///
/// Query strings and fragments are ignored. Returns `None` when the link has
/// no recognised extension.
pub fn infer_media(url: &str) -> Option<MediaInfo> {
    let format = mime_for_url(url)?;
    Some(MediaInfo {
        media_type: MediaType::from_mime(format),
        format: format.to_string(),
    })
}

fn mime_for_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next()?;
    let last_segment = path.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;

    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/x-wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp4" | "m4v" => "video/mp4",
        "mpeg" | "mpg" => "video/mpeg",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_media_urls() {
        let urls = split_media_urls("http://x/a.jpg|http://x/b.mp4", &['|']);
        assert_eq!(urls, vec!["http://x/a.jpg", "http://x/b.mp4"]);

        let urls = split_media_urls(" http://x/a.jpg ; ;http://x/c.wav ", &['|', ';']);
        assert_eq!(urls, vec!["http://x/a.jpg", "http://x/c.wav"]);
        assert!(split_media_urls("", &['|']).is_empty());
    }

    #[test]
    fn test_infer_media() {
        let info = infer_media("http://x/a.jpg").unwrap();
        assert_eq!(info.format, "image/jpeg");
        assert_eq!(info.media_type, Some(MediaType::StillImage));

        let info = infer_media("http://x/b.MP4?size=large#t=1").unwrap();
        assert_eq!(info.format, "video/mp4");
        assert_eq!(info.media_type, Some(MediaType::MovingImage));

        assert_eq!(infer_media("http://x/c.mp3").unwrap().media_type, Some(MediaType::Sound));
        assert_eq!(infer_media("http://x/doc.pdf").unwrap().media_type, None);
    }

    #[test]
    fn test_infer_media_unknown() {
        assert!(infer_media("http://x/media/12345").is_none());
        assert!(infer_media("http://x.org/").is_none());
        assert!(infer_media("http://x/file.xyz").is_none());
    }
}
