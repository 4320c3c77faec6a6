//! Boundary to the external text-generation capability.
//!
//! The pipeline hands over a task description plus named text inputs and stores whatever
//! comes back. It never inspects or edits the returned text.

pub mod http;

use crate::error::Result;

pub use http::{ChatCompletionsGenerator, InsightConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightInput {
    pub name: &'static str,
    pub description: &'static str,
    pub value: String,
}

/// One generation request: what to do, the named inputs, and the expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightTask {
    pub name: &'static str,
    pub instruction: &'static str,
    pub inputs: Vec<InsightInput>,
    pub output_name: &'static str,
    pub output_description: &'static str,
}

impl InsightTask {
    #[must_use]
    pub fn new(name: &'static str, instruction: &'static str) -> Self {
        Self {
            name,
            instruction,
            inputs: Vec::new(),
            output_name: "insights",
            output_description: "key insights and observations",
        }
    }

    #[must_use]
    pub fn input(
        mut self,
        name: &'static str,
        description: &'static str,
        value: impl Into<String>,
    ) -> Self {
        self.inputs.push(InsightInput {
            name,
            description,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn output(mut self, name: &'static str, description: &'static str) -> Self {
        self.output_name = name;
        self.output_description = description;
        self
    }

    #[must_use]
    pub fn input_value(&self, name: &str) -> Option<&str> {
        self.inputs
            .iter()
            .find(|input| input.name == name)
            .map(|input| input.value.as_str())
    }

    #[must_use]
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(self.instruction);
        prompt.push_str("\n\n");
        for input in &self.inputs {
            prompt.push_str(&format!(
                "--- {} ({}) ---\n{}\n\n",
                input.name, input.description, input.value
            ));
        }
        prompt.push_str(&format!(
            "Respond with the {} ({}) as plain text.",
            self.output_name, self.output_description
        ));
        prompt
    }
}

pub trait InsightGenerator {
    fn generate(&self, task: &InsightTask) -> Result<String>;
}

impl<G: InsightGenerator + ?Sized> InsightGenerator for &G {
    fn generate(&self, task: &InsightTask) -> Result<String> {
        (**self).generate(task)
    }
}

impl<G: InsightGenerator + ?Sized> InsightGenerator for Box<G> {
    fn generate(&self, task: &InsightTask) -> Result<String> {
        (**self).generate(task)
    }
}
