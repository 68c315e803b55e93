//! Built-in platform template catalog.
//!
//! Templates are static data. Widths and heights are stored as text and
//! parsed with [`DimensionValue`] so a template can leave one axis flexible
//! (`"auto"`), in which case the image keeps its aspect ratio on that axis.

use crate::dimension::DimensionValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub width: &'static str,
    pub height: &'static str,
}

/// Resolved template target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateTarget {
    /// Fill exactly this box (resize to cover, then centre crop).
    Exact { width: u32, height: u32 },
    /// Scale to this width, height follows the aspect ratio.
    Width(u32),
    /// Scale to this height, width follows the aspect ratio.
    Height(u32),
}

pub const TEMPLATES: &[Template] = &[
    Template {
        id: "instagram-square",
        name: "Instagram Square Post",
        category: "social",
        width: "1080",
        height: "1080",
    },
    Template {
        id: "instagram-portrait",
        name: "Instagram Portrait Post",
        category: "social",
        width: "1080",
        height: "1350",
    },
    Template {
        id: "instagram-story",
        name: "Instagram Story",
        category: "social",
        width: "1080",
        height: "1920",
    },
    Template {
        id: "facebook-cover",
        name: "Facebook Cover",
        category: "social",
        width: "820",
        height: "312",
    },
    Template {
        id: "twitter-header",
        name: "X / Twitter Header",
        category: "social",
        width: "1500",
        height: "500",
    },
    Template {
        id: "linkedin-banner",
        name: "LinkedIn Banner",
        category: "social",
        width: "1584",
        height: "396",
    },
    Template {
        id: "youtube-thumbnail",
        name: "YouTube Thumbnail",
        category: "video",
        width: "1280",
        height: "720",
    },
    Template {
        id: "open-graph",
        name: "Open Graph Image",
        category: "web",
        width: "1200",
        height: "630",
    },
    Template {
        id: "web-hero",
        name: "Website Hero",
        category: "web",
        width: "1920",
        height: "auto",
    },
    Template {
        id: "blog-inline",
        name: "Blog Inline Image",
        category: "web",
        width: "800",
        height: "flexible",
    },
    Template {
        id: "pinterest-pin",
        name: "Pinterest Pin",
        category: "social",
        width: "1000",
        height: "1500",
    },
    Template {
        id: "email-header",
        name: "Email Header",
        category: "web",
        width: "600",
        height: "{height}",
    },
];

pub fn find_template(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id)
}

impl Template {
    pub fn width(&self) -> DimensionValue {
        DimensionValue::parse(self.width)
    }

    pub fn height(&self) -> DimensionValue {
        DimensionValue::parse(self.height)
    }

    /// How an image should be fitted, or `None` if neither axis is fixed.
    pub fn target(&self) -> Option<TemplateTarget> {
        match (self.width().pixels(), self.height().pixels()) {
            (Some(width), Some(height)) => Some(TemplateTarget::Exact { width, height }),
            (Some(width), None) => Some(TemplateTarget::Width(width)),
            (None, Some(height)) => Some(TemplateTarget::Height(height)),
            (None, None) => None,
        }
    }

    /// A template matches a size when every fixed axis is equal.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        let axis = |d: DimensionValue, actual: u32| match d.pixels() {
            Some(px) => px == actual,
            None => d.is_variable,
        };
        axis(self.width(), width) && axis(self.height(), height)
    }
}

/// Templates whose dimensions fit an existing image size.
pub fn matching_templates(width: u32, height: u32) -> Vec<&'static Template> {
    TEMPLATES
        .iter()
        .filter(|t| t.matches(width, height))
        .collect()
}
