//! # Fallback Results
//!
//! Deterministic degraded results handed out when a task cannot produce a real
//! value: the breaker is open, retries are exhausted, or degraded mode ran the task
//! once and it failed.
//!
//! The category is read from an explicit tag prefix (`"jsx:hero-section"`) when
//! present, otherwise inferred from the task id's wording.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Kind of pipeline output a fallback stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCategory {
    ContentPlan,
    ContentCreation,
    JsxGeneration,
    TemplateAnalysis,
    LayoutAnalysis,
    ImageAnalysis,
    VectorSearch,
    Generic,
}

impl FallbackCategory {
    /// Infer the category for a task id
    pub fn infer(task_id: &str) -> Self {
        if let Some((tag, _)) = task_id.split_once(':') {
            if let Some(category) = Self::from_tag(tag) {
                return category;
            }
        }

        let id = task_id.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|needle| id.contains(needle));

        if has(&["plan", "outline", "structure"]) {
            FallbackCategory::ContentPlan
        } else if has(&["jsx", "component", "render"]) {
            FallbackCategory::JsxGeneration
        } else if has(&["template"]) {
            FallbackCategory::TemplateAnalysis
        } else if has(&["layout"]) {
            FallbackCategory::LayoutAnalysis
        } else if has(&["image", "visual", "photo"]) {
            FallbackCategory::ImageAnalysis
        } else if has(&["vector", "search", "embedding", "similar"]) {
            FallbackCategory::VectorSearch
        } else if has(&["content", "article", "section", "write"]) {
            FallbackCategory::ContentCreation
        } else {
            FallbackCategory::Generic
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        let category = match tag.trim().to_ascii_lowercase().as_str() {
            "plan" | "content_plan" => FallbackCategory::ContentPlan,
            "content" | "content_creation" => FallbackCategory::ContentCreation,
            "jsx" | "jsx_generation" => FallbackCategory::JsxGeneration,
            "template" | "template_analysis" => FallbackCategory::TemplateAnalysis,
            "layout" | "layout_analysis" => FallbackCategory::LayoutAnalysis,
            "image" | "image_analysis" => FallbackCategory::ImageAnalysis,
            "vector" | "vector_search" => FallbackCategory::VectorSearch,
            "generic" => FallbackCategory::Generic,
            _ => return None,
        };
        Some(category)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackCategory::ContentPlan => "content_plan",
            FallbackCategory::ContentCreation => "content_creation",
            FallbackCategory::JsxGeneration => "jsx_generation",
            FallbackCategory::TemplateAnalysis => "template_analysis",
            FallbackCategory::LayoutAnalysis => "layout_analysis",
            FallbackCategory::ImageAnalysis => "image_analysis",
            FallbackCategory::VectorSearch => "vector_search",
            FallbackCategory::Generic => "generic",
        }
    }
}

impl fmt::Display for FallbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of degraded results. Must be total and deterministic.
pub trait FallbackResultProvider<T>: Send + Sync {
    /// Fallback for an already-categorized task
    fn fallback_for(&self, task_id: &str, category: FallbackCategory) -> T;

    fn get(&self, task_id: &str) -> T {
        self.fallback_for(task_id, FallbackCategory::infer(task_id))
    }
}

impl<T, F> FallbackResultProvider<T> for F
where
    F: Fn(&str, FallbackCategory) -> T + Send + Sync,
{
    fn fallback_for(&self, task_id: &str, category: FallbackCategory) -> T {
        self(task_id, category)
    }
}

/// JSON fallbacks shaped like each stage's normal output, all marked degraded
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkedFallbackProvider;

impl MarkedFallbackProvider {
    pub fn new() -> Self {
        Self
    }

    fn payload(category: FallbackCategory) -> Value {
        match category {
            FallbackCategory::ContentPlan => json!({
                "sections": [
                    {
                        "title": "Introduction",
                        "subtitle": "Setting the scene",
                        "summary": "An overview of the topic and why it matters."
                    },
                    {
                        "title": "Main Story",
                        "subtitle": "The details",
                        "summary": "The core content of the article."
                    },
                    {
                        "title": "Conclusion",
                        "subtitle": "Key takeaways",
                        "summary": "A short recap of the main points."
                    }
                ]
            }),
            FallbackCategory::ContentCreation => json!({
                "title": "Untitled Article",
                "subtitle": "",
                "body": "Content is temporarily unavailable.",
                "word_count": 0
            }),
            FallbackCategory::JsxGeneration => json!({
                "jsx_components": [],
                "component_count": 0
            }),
            FallbackCategory::TemplateAnalysis => json!({
                "component_name": "DefaultComponent",
                "props": ["title", "subtitle", "body", "imageUrl"],
                "layout_type": "simple",
                "layout_confidence": 0.3,
                "analysis_success": false
            }),
            FallbackCategory::LayoutAnalysis => json!({
                "layout_type": "single_column",
                "recommended_layout": "minimal",
                "score": 0.5
            }),
            FallbackCategory::ImageAnalysis => json!({
                "images": [],
                "descriptions": []
            }),
            FallbackCategory::VectorSearch => json!({
                "results": [],
                "total_results": 0
            }),
            FallbackCategory::Generic => json!({}),
        }
    }
}

impl FallbackResultProvider<Value> for MarkedFallbackProvider {
    fn fallback_for(&self, task_id: &str, category: FallbackCategory) -> Value {
        let mut value = Self::payload(category);
        if let Value::Object(fields) = &mut value {
            fields.insert("fallback_used".to_string(), Value::Bool(true));
            fields.insert("degraded".to_string(), Value::Bool(true));
            fields.insert("task_id".to_string(), Value::String(task_id.to_string()));
            fields.insert(
                "category".to_string(),
                Value::String(category.as_str().to_string()),
            );
        }
        value
    }
}
