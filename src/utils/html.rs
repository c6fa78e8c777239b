use std::collections::HashSet;

use ammonia::Builder;

/// The text a reader would actually see once markup is stripped.
///
/// No tag survives; <script> and <style> are dropped together with their
/// content, other tags are unwrapped. Entities in the result stay escaped, so
/// this is meant for checks on the visible text, not for storage.
pub fn visible_text(input: &str) -> String {
    Builder::new().tags(HashSet::new()).clean(input).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_but_keeps_text() {
        assert_eq!(visible_text("Nice <script>alert(1)</script>lesson"), "Nice lesson");
    }

    #[test]
    fn empty_markup_has_no_text() {
        assert_eq!(visible_text("   <b></b>  ").trim(), "");
        assert_eq!(visible_text("<p><i> </i></p>").trim(), "");
    }

    #[test]
    fn unwraps_formatting_tags() {
        assert_eq!(visible_text("<b>bold</b> move"), "bold move");
    }
}
