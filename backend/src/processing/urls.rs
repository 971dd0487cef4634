use crate::config::OUTPUT_SUBDIR;

/// URL prefix the static directory is mounted under.
pub const STATIC_MOUNT: &str = "/static";

/// Builds absolute URLs for files in the output directory.
#[derive(Clone, Debug)]
pub struct PublicUrls {
    base: String,
}

impl PublicUrls {
    /// `base` is scheme and authority, e.g. `http://localhost:5000`.
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn image_url(&self, file_name: &str) -> String {
        format!(
            "{}{}/{}/{}",
            self.base,
            STATIC_MOUNT,
            OUTPUT_SUBDIR,
            urlencoding::encode(file_name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_url_points_into_static_output_dir() {
        let urls = PublicUrls::new("http://localhost:5000/");
        assert_eq!(
            urls.image_url("a_happy.png"),
            "http://localhost:5000/static/output_images/a_happy.png"
        );
    }

    #[test]
    fn image_url_escapes_file_name() {
        let urls = PublicUrls::new("https://emotions.example");
        assert_eq!(
            urls.image_url("odd name#1.png"),
            "https://emotions.example/static/output_images/odd%20name%231.png"
        );
    }
}
