/// Rewrites dot-delimited names and tag keys into the style a flavor expects.
///
/// Tag values are never rewritten, only sanitized by the flavor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NamingConvention {
    /// Keeps names as they are: `my.counter`.
    Dot,
    /// Joins segments in camel case: `myCounter`.
    CamelCase,
    /// Joins segments with underscores: `my_counter`.
    SnakeCase,
}

impl NamingConvention {
    /// Applies the convention to a meter name.
    pub fn name(&self, name: &str) -> String {
        match self {
            Self::Dot => name.to_owned(),
            Self::CamelCase => camel_case(name),
            Self::SnakeCase => name.replace('.', "_"),
        }
    }

    /// Applies the convention to a tag key.
    pub fn tag_key(&self, key: &str) -> String {
        self.name(key)
    }

    /// Applies the convention to a tag value.
    pub fn tag_value(&self, value: &str) -> String {
        value.to_owned()
    }
}

fn camel_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut upper = false;

    for c in name.chars() {
        if c == '.' {
            upper = !result.is_empty();
        } else if upper {
            result.extend(c.to_uppercase());
            upper = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Replaces every character matching `reserved` with an underscore.
pub(crate) fn sanitize(value: &str, reserved: impl Fn(char) -> bool) -> String {
    value
        .chars()
        .map(|c| if reserved(c) { '_' } else { c })
        .collect()
}

/// Characters that terminate or corrupt a line in every flavor.
pub(crate) fn is_line_reserved(c: char) -> bool {
    matches!(c, ':' | '|' | '@' | '\n' | '\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(NamingConvention::CamelCase.name("my.counter"), "myCounter");
        assert_eq!(
            NamingConvention::CamelCase.name("http.server.requests"),
            "httpServerRequests"
        );
        assert_eq!(NamingConvention::CamelCase.name(".leading..dots"), "leadingDots");
        assert_eq!(NamingConvention::CamelCase.name("plain"), "plain");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(NamingConvention::SnakeCase.name("my.counter"), "my_counter");
        assert_eq!(NamingConvention::SnakeCase.tag_key("my.tag"), "my_tag");
        assert_eq!(NamingConvention::SnakeCase.tag_value("a.b"), "a.b");
    }

    #[test]
    fn test_dot() {
        assert_eq!(NamingConvention::Dot.name("my.counter"), "my.counter");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a:b|c@d\ne", is_line_reserved), "a_b_c_d_e");
        assert_eq!(sanitize("clean", is_line_reserved), "clean");
    }
}
