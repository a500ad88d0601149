//! Industry prompt selector
//!
//! Maps a detected business vertical to a system-prompt template and an
//! allowed-tool subset. Detection prefers lead tags over keyword scanning;
//! the generic profile is the fallback when nothing matches.

use std::collections::HashMap;

/// One business vertical
#[derive(Debug, Clone)]
pub struct IndustryProfile {
    pub key: &'static str,
    pub display_name: &'static str,
    /// Keywords that trigger this vertical in a customer message
    pub triggers: &'static [&'static str],
    /// Tools that make sense for this vertical; intersected with the tenant
    /// allowlist before anything is offered to the model
    pub allowed_tools: &'static [&'static str],
    /// System prompt template with `{{variable}}` placeholders
    pub template: &'static str,
    /// Template defaults, overridable by runtime context
    pub defaults: &'static [(&'static str, &'static str)],
}

const ALL_TOOLS: &[&str] = &[
    "send_multimedia",
    "save_conversation_data",
    "analyze_customer_intent",
    "schedule_follow_up",
];

const RESTAURANT: IndustryProfile = IndustryProfile {
    key: "restaurant",
    display_name: "Restaurant",
    triggers: &[
        "menú", "menu", "mesa", "reservar", "reservación", "platillo", "comida", "pedido",
        "order food", "table", "reservation",
    ],
    allowed_tools: ALL_TOOLS,
    template: "## Role\n\
{{personality}}\n\
You answer for {{business_name}}, a restaurant, over WhatsApp.\n\
## Business\n\
{{business}}\n\
## Objectives\n\
{{objectives}}\n\
## Guidance\n\
Offer to send the menu when the customer asks what is available. Capture \
reservations and orders with save_conversation_data. Keep replies short; \
this is a chat, not an email.",
    defaults: &[("business_name", "our restaurant")],
};

const RETAIL: IndustryProfile = IndustryProfile {
    key: "retail",
    display_name: "Retail & e-commerce",
    triggers: &[
        "catálogo", "catalog", "precio", "price", "stock", "producto", "product", "envío",
        "shipping", "comprar", "buy",
    ],
    allowed_tools: ALL_TOOLS,
    template: "## Role\n\
{{personality}}\n\
You answer for {{business_name}}, an online store, over WhatsApp.\n\
## Business\n\
{{business}}\n\
## Objectives\n\
{{objectives}}\n\
## Guidance\n\
Send the catalog or price list when asked about products. Record orders and \
inquiries with save_conversation_data and score purchase intent with \
analyze_customer_intent.",
    defaults: &[("business_name", "our store")],
};

const SERVICES: IndustryProfile = IndustryProfile {
    key: "services",
    display_name: "Professional services",
    triggers: &[
        "cita", "cotización", "cotizacion", "quote", "servicio", "service", "presupuesto",
        "agendar", "appointment",
    ],
    allowed_tools: ALL_TOOLS,
    template: "## Role\n\
{{personality}}\n\
You answer for {{business_name}}, a service business, over WhatsApp.\n\
## Business\n\
{{business}}\n\
## Objectives\n\
{{objectives}}\n\
## Guidance\n\
Capture appointment requests with save_conversation_data and schedule \
follow-ups for quotes that are not closed in the conversation.",
    defaults: &[("business_name", "our team")],
};

const HEALTHCARE: IndustryProfile = IndustryProfile {
    key: "healthcare",
    display_name: "Healthcare",
    triggers: &[
        "consulta", "doctor", "doctora", "médico", "medico", "síntoma", "sintoma", "clínica",
        "clinica", "dentista",
    ],
    // No multimedia blasting in a medical context
    allowed_tools: &[
        "save_conversation_data",
        "analyze_customer_intent",
        "schedule_follow_up",
    ],
    template: "## Role\n\
{{personality}}\n\
You answer for {{business_name}}, a healthcare practice, over WhatsApp.\n\
## Business\n\
{{business}}\n\
## Objectives\n\
{{objectives}}\n\
## Guidance\n\
Never give medical advice; collect appointment requests and hand anything \
clinical to the staff. Be warm and unhurried.",
    defaults: &[("business_name", "the practice")],
};

const REAL_ESTATE: IndustryProfile = IndustryProfile {
    key: "real_estate",
    display_name: "Real estate",
    triggers: &[
        "casa", "departamento", "depa", "renta", "venta", "propiedad", "terreno", "house",
        "apartment", "rent",
    ],
    allowed_tools: ALL_TOOLS,
    template: "## Role\n\
{{personality}}\n\
You answer for {{business_name}}, a real-estate agency, over WhatsApp.\n\
## Business\n\
{{business}}\n\
## Objectives\n\
{{objectives}}\n\
## Guidance\n\
Send the brochure for listings on request, qualify budget and zone with \
analyze_customer_intent, and schedule viewing follow-ups.",
    defaults: &[("business_name", "the agency")],
};

const GENERIC: IndustryProfile = IndustryProfile {
    key: "generic",
    display_name: "General business",
    triggers: &[],
    allowed_tools: ALL_TOOLS,
    template: "## Role\n\
{{personality}}\n\
You answer for {{business_name}} over WhatsApp.\n\
## Business\n\
{{business}}\n\
## Objectives\n\
{{objectives}}",
    defaults: &[("business_name", "the business")],
};

/// Selects and renders the system prompt for a vertical
pub struct IndustryPromptSelector {
    profiles: Vec<IndustryProfile>,
    generic: IndustryProfile,
    max_prompt_chars: usize,
}

impl IndustryPromptSelector {
    pub fn new(max_prompt_chars: usize) -> Self {
        Self {
            profiles: vec![RESTAURANT, RETAIL, SERVICES, HEALTHCARE, REAL_ESTATE],
            generic: GENERIC,
            max_prompt_chars,
        }
    }

    pub fn profile(&self, key: &str) -> &IndustryProfile {
        self.profiles
            .iter()
            .find(|p| p.key == key)
            .unwrap_or(&self.generic)
    }

    /// Detect the vertical for a message
    ///
    /// A lead tag matching an industry key wins outright; otherwise the
    /// message is scanned against each profile's trigger set and the profile
    /// with the most hits is chosen.
    pub fn detect(&self, message: &str, existing_tags: &[String]) -> &IndustryProfile {
        for tag in existing_tags {
            if let Some(profile) = self.profiles.iter().find(|p| p.key == tag) {
                return profile;
            }
        }

        let lowered = message.to_lowercase();
        let best = self
            .profiles
            .iter()
            .map(|p| {
                let hits = p
                    .triggers
                    .iter()
                    .filter(|t| lowered.contains(&t.to_lowercase()))
                    .count();
                (hits, p)
            })
            .max_by_key(|(hits, _)| *hits);

        match best {
            Some((hits, profile)) if hits > 0 => profile,
            _ => &self.generic,
        }
    }

    /// Render a profile's template
    ///
    /// Substitution order: profile defaults first, then runtime context on
    /// top. Unmatched placeholders render as empty strings.
    pub fn render(&self, profile: &IndustryProfile, context: &HashMap<String, String>) -> String {
        let mut vars: HashMap<&str, &str> = profile.defaults.iter().copied().collect();
        for (key, value) in context {
            vars.insert(key.as_str(), value.as_str());
        }

        let mut rendered = profile.template.to_string();
        for (key, value) in &vars {
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
        }
        // Clear any placeholder with no binding
        while let Some(start) = rendered.find("{{") {
            match rendered[start..].find("}}") {
                Some(rel_end) => rendered.replace_range(start..start + rel_end + 2, ""),
                None => break,
            }
        }

        truncate_preserving_headers(&rendered, self.max_prompt_chars)
    }
}

/// Truncate section bodies while keeping every `##` header
///
/// When the rendered prompt exceeds the budget, section bodies are cut in
/// order until it fits; headers always survive so the model keeps the
/// prompt's overall shape.
fn truncate_preserving_headers(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let headers: Vec<&str> = text.lines().filter(|l| l.starts_with("## ")).collect();
    let header_budget: usize = headers.iter().map(|h| h.chars().count() + 1).sum();
    let mut body_budget = max_chars.saturating_sub(header_budget);

    let mut out = String::new();
    for line in text.lines() {
        if line.starts_with("## ") {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        } else {
            let len = line.chars().count() + 1;
            if len <= body_budget {
                body_budget -= len;
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(line);
            } else if body_budget > 1 {
                let truncated: String = line.chars().take(body_budget - 1).collect();
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&truncated);
                body_budget = 0;
            }
        }
    }
    out
}
