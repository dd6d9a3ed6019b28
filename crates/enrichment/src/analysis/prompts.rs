//! Prompt template management.

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{EnrichmentError, EnrichmentResult};

/// Renders the embedded user-prompt templates.
#[derive(Debug)]
pub struct PromptManager {
    handlebars: Handlebars<'static>,
}

impl PromptManager {
    /// Create a new prompt manager with embedded templates.
    pub fn new() -> EnrichmentResult<Self> {
        let mut handlebars = Handlebars::new();
        // Prompts are plain text, never HTML.
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, template) in [
            ("intent", INTENT_TEMPLATE),
            ("context", CONTEXT_TEMPLATE),
            ("category", CATEGORY_TEMPLATE),
        ] {
            handlebars
                .register_template_string(name, template)
                .map_err(|e| EnrichmentError::Template {
                    reason: format!("{name}: {e}"),
                })?;
        }

        Ok(Self { handlebars })
    }

    /// Render a template with the given data.
    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> EnrichmentResult<String> {
        self.handlebars
            .render(template, data)
            .map_err(|e| EnrichmentError::Template {
                reason: format!("{template}: {e}"),
            })
    }
}

const INTENT_TEMPLATE: &str = r"Analyze this {{source}} bookmark:

Author: {{author}}
Content: {{content}}
URL: {{url}}
{{#if author_url}}Author Profile: {{author_url}}{{/if}}

Why did the user likely save this bookmark? What value does it provide?";

const CONTEXT_TEMPLATE: &str = r"Extract metadata from this {{source}} bookmark:

Author: {{author}}
Content: {{content}}
{{#if author_url}}Author Profile: {{author_url}}{{/if}}

Please extract:
- Author expertise/bio (if identifiable)
- Company/affiliation (if mentioned)
- Primary topic
- Key themes (2-5 tags)";

const CATEGORY_TEMPLATE: &str = r"Categorize this bookmark:

Author: {{author}}
Content: {{content}}{{#if intent}}

User Intent: {{intent}}{{/if}}{{#if has_context}}

Topic: {{topic}}{{#if themes}}
Themes: {{themes}}{{/if}}{{#if company}}
Company: {{company}}{{/if}}{{/if}}

Which category does this belong to: Inspo, Leads/Markets, or Tutorials?";
