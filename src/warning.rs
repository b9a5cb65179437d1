#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCode {
    CaptionFallback,
    DuplicateImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractWarning {
    pub code: WarningCode,
    pub message: String,
    pub page: Option<u32>,
    pub image_index: Option<usize>,
}

impl ExtractWarning {
    #[must_use]
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            page: None,
            image_index: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_image_index(mut self, image_index: usize) -> Self {
        self.image_index = Some(image_index);
        self
    }
}
