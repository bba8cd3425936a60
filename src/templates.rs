use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::caption::Anchor;

/// A curated background image and the fixed caption anchors authored for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub top: Anchor,
    pub bottom: Anchor,
}

const fn anchor(x: f32, y: f32, max_width: f32) -> Anchor {
    Anchor { x, y, max_width }
}

// (id, name, image url, top anchor, bottom anchor)
const BUILTIN: &[(&str, &str, &str, Anchor, Anchor)] = &[
    (
        "drake",
        "Drake Hotline Bling",
        "https://i.imgflip.com/30b1gx.jpg",
        anchor(350.0, 100.0, 300.0),
        anchor(350.0, 400.0, 300.0),
    ),
    (
        "distracted",
        "Distracted Boyfriend",
        "https://i.imgflip.com/1ur9b0.jpg",
        anchor(250.0, 50.0, 400.0),
        anchor(250.0, 450.0, 400.0),
    ),
    (
        "expanding-brain",
        "Expanding Brain",
        "https://i.imgflip.com/1jwhww.jpg",
        anchor(300.0, 50.0, 300.0),
        anchor(300.0, 550.0, 300.0),
    ),
    (
        "two-buttons",
        "Two Buttons",
        "https://i.imgflip.com/1g8my4.jpg",
        anchor(250.0, 50.0, 300.0),
        anchor(250.0, 450.0, 300.0),
    ),
    (
        "change-my-mind",
        "Change My Mind",
        "https://i.imgflip.com/24y43o.jpg",
        anchor(250.0, 350.0, 400.0),
        anchor(250.0, 450.0, 400.0),
    ),
    (
        "success-kid",
        "Success Kid",
        "https://i.imgflip.com/1bhk.jpg",
        anchor(250.0, 30.0, 400.0),
        anchor(250.0, 450.0, 400.0),
    ),
    (
        "one-does-not-simply",
        "One Does Not Simply",
        "https://i.imgflip.com/1bij.jpg",
        anchor(250.0, 50.0, 400.0),
        anchor(250.0, 400.0, 400.0),
    ),
    (
        "batman-slap",
        "Batman Slapping Robin",
        "https://i.imgflip.com/9vct.jpg",
        anchor(200.0, 50.0, 300.0),
        anchor(500.0, 50.0, 300.0),
    ),
    (
        "is-this",
        "Is This A Pigeon",
        "https://i.imgflip.com/1o00in.jpg",
        anchor(250.0, 50.0, 400.0),
        anchor(250.0, 450.0, 400.0),
    ),
    (
        "doge",
        "Doge",
        "https://i.imgflip.com/4t0m5.jpg",
        anchor(100.0, 50.0, 300.0),
        anchor(400.0, 400.0, 300.0),
    ),
];

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    pub fn builtin() -> Self {
        let templates = BUILTIN
            .iter()
            .map(|(id, name, image_url, top, bottom)| Template {
                id: id.to_string(),
                name: name.to_string(),
                image_url: image_url.to_string(),
                top: *top,
                bottom: *bottom,
            })
            .collect();
        Self { templates }
    }

    /// Adds entries after the built-ins; an entry reusing an id replaces the
    /// existing template in place.
    pub fn with_extra(mut self, extra: Vec<Template>) -> Self {
        for template in extra {
            if let Some(existing) = self.templates.iter_mut().find(|t| t.id == template.id) {
                *existing = template;
            } else {
                self.templates.push(template);
            }
        }
        self
    }

    pub fn list(&self) -> &[Template] {
        &self.templates
    }

    pub fn find(&self, id: &str) -> Option<&Template> {
        let id = id.trim();
        self.templates
            .iter()
            .find(|template| template.id.eq_ignore_ascii_case(id))
    }

    pub fn random(&self) -> Option<&Template> {
        if self.templates.is_empty() {
            return None;
        }
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as usize;
        self.templates.get(seed % self.templates.len())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_the_curated_templates() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(catalog.len(), 10);
        let drake = catalog.find("drake").expect("drake");
        assert_eq!(drake.top, anchor(350.0, 100.0, 300.0));
        assert_eq!(drake.bottom.y, 400.0);
        assert!(catalog.find("DOGE").is_some());
        assert!(catalog.find("nope").is_none());
    }

    #[test]
    fn extra_templates_replace_or_append() {
        let custom = Template {
            id: "custom".to_string(),
            name: "Custom".to_string(),
            image_url: "./custom.png".to_string(),
            top: anchor(10.0, 10.0, 100.0),
            bottom: anchor(10.0, 90.0, 100.0),
        };
        let replaced_drake = Template {
            id: "drake".to_string(),
            name: "Local Drake".to_string(),
            image_url: "./drake.jpg".to_string(),
            top: anchor(1.0, 2.0, 3.0),
            bottom: anchor(4.0, 5.0, 6.0),
        };
        let catalog = TemplateCatalog::builtin().with_extra(vec![custom, replaced_drake]);
        assert_eq!(catalog.len(), 11);
        assert_eq!(catalog.list()[0].name, "Local Drake");
        assert_eq!(catalog.list()[10].id, "custom");
    }

    #[test]
    fn random_picks_from_the_catalog() {
        let catalog = TemplateCatalog::builtin();
        let picked = catalog.random().expect("non-empty");
        assert!(catalog.find(&picked.id).is_some());
    }

    #[test]
    fn template_deserializes_from_toml() {
        let template: Template = toml::from_str(
            r#"
id = "custom"
name = "Custom"
image_url = "https://example.com/custom.jpg"
top = { x = 250, y = 50, max_width = 400 }
bottom = { x = 250, y = 450, max_width = 400 }
"#,
        )
        .expect("parse");
        assert_eq!(template.top.max_width, 400.0);
    }
}
