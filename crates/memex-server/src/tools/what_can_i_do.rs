//! `what-can-i-do`: a no-argument capability blurb so a chat model can
//! discover the rest of the tool set without special-casing it in a
//! system prompt.

use super::{Tool, ToolError, ToolOutput};
use crate::instance::Instance;
use async_trait::async_trait;
use serde_json::json;

pub struct WhatCanIDo {
    others: Vec<&'static str>,
}

impl WhatCanIDo {
    pub fn new(others: Vec<&'static str>) -> Self {
        WhatCanIDo { others }
    }
}

#[async_trait]
impl Tool for WhatCanIDo {
    fn name(&self) -> &'static str {
        "what-can-i-do"
    }

    fn description(&self) -> &'static str {
        "Describes the available tools and what questions they can answer."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, instance: &Instance, _args: serde_json::Value) -> ToolOutput {
        let _ = instance;
        Ok(json!({
            "instance": instance.name,
            "tools": self.others,
            "summary": "This instance can search captured screenshots by meaning or substring, \
                report activity volume over time, sample a date range, and summarize a day by \
                time of period. All of it reads from one instance's own captures; nothing here \
                reaches across instances or out to the web.",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_the_other_tool_names() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        let tool = WhatCanIDo::new(vec!["search-screenshots", "get-stats"]);
        let out = tool.call(&instance, json!({})).await.unwrap();
        let tools = out["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(out["instance"], "t");
    }

    #[tokio::test]
    async fn never_names_itself() {
        let others = vec!["search-screenshots"];
        let tool = WhatCanIDo::new(others.clone());
        assert!(!others.contains(&tool.name()));
    }
}
