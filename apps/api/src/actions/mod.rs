// Action API: one handler per capability.
// Every handler goes through the quota gate, makes exactly one provider call
// chain, and appends one creation record on success.

pub mod handlers;
pub mod upload;

use crate::models::creation::CreationType;
use crate::quota::AccessPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Article,
    BlogTitle,
    Image,
    RemoveBackground,
    RemoveObject,
    ResumeReview,
}

impl ActionKind {
    /// Text generation is metered for free accounts; everything else is premium-only.
    pub fn policy(self) -> AccessPolicy {
        match self {
            ActionKind::Article | ActionKind::BlogTitle => AccessPolicy::Metered,
            ActionKind::Image
            | ActionKind::RemoveBackground
            | ActionKind::RemoveObject
            | ActionKind::ResumeReview => AccessPolicy::PremiumOnly,
        }
    }

    pub fn creation_type(self) -> CreationType {
        match self {
            ActionKind::Article => CreationType::Article,
            ActionKind::BlogTitle => CreationType::BlogTitle,
            ActionKind::Image | ActionKind::RemoveBackground | ActionKind::RemoveObject => {
                CreationType::Image
            }
            ActionKind::ResumeReview => CreationType::ResumeReview,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Article => "generate-article",
            ActionKind::BlogTitle => "generate-blog-title",
            ActionKind::Image => "generate-image",
            ActionKind::RemoveBackground => "remove-image-background",
            ActionKind::RemoveObject => "remove-image-object",
            ActionKind::ResumeReview => "resume-review",
        }
    }
}
