use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use unic_langid::LanguageIdentifier;

const EN_GB: &str = include_str!("../i18n/en-GB.ftl");

/// Fluent-backed message lookup over the built-in `.ftl` resources.
pub struct FluentLoc {
    bundle: FluentBundle<FluentResource>,
}

impl FluentLoc {
    /// Only en-GB strings ship; other languages get them too.
    pub fn builtin(lang: &str) -> Self {
        let langid: LanguageIdentifier = lang.parse().unwrap_or_default();

        // A partially broken resource still yields the messages that parsed.
        let res = FluentResource::try_new(EN_GB.to_owned()).unwrap_or_else(|(res, _)| res);

        let mut bundle = FluentBundle::new(vec![langid]);
        // Plain terminal output; no Unicode isolation marks around arguments.
        bundle.set_use_isolating(false);
        bundle.add_resource_overriding(res);
        Self { bundle }
    }

    /// Format a message by code with named args (("name","value"), ...).
    /// Returns the code itself if not found.
    pub fn msg(&self, code: &str, args: &[(&str, &str)]) -> String {
        let Some(msg) = self.bundle.get_message(code) else {
            return code.to_string();
        };
        let Some(pattern) = msg.value() else {
            return code.to_string();
        };

        let mut fa = FluentArgs::new();
        for (k, v) in args {
            fa.set(*k, FluentValue::from(*v));
        }

        let mut errs = vec![];
        let s = self.bundle.format_pattern(pattern, Some(&fa), &mut errs).to_string();

        if errs.is_empty() {
            s
        } else {
            code.to_string()
        }
    }
}

impl Default for FluentLoc {
    fn default() -> Self {
        Self::builtin("en-GB")
    }
}
