/// Feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_edit: bool,
}

impl MessagingCapabilities {
    pub const TELEGRAM: Self = Self {
        supports_edit: true,
    };
}
