/// Splits a full name into (last name, first name) at the first run of
/// whitespace. Anything after that run, inner spaces included, is the first
/// name; a single word leaves the first name empty.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let trimmed = full_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((last, rest)) => (last.to_string(), rest.trim_start().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_whitespace_run() {
        assert_eq!(split_full_name("Yamada Taro"), ("Yamada".into(), "Taro".into()));
        assert_eq!(split_full_name("  Yamada \t  Taro "), ("Yamada".into(), "Taro".into()));
    }

    #[test]
    fn ideographic_space_counts_as_whitespace() {
        assert_eq!(split_full_name("山田\u{3000}太郎"), ("山田".into(), "太郎".into()));
    }

    #[test]
    fn keeps_remaining_words_in_first_name() {
        assert_eq!(
            split_full_name("Smith Mary Ann"),
            ("Smith".into(), "Mary Ann".into())
        );
    }

    #[test]
    fn single_word_has_empty_first_name() {
        assert_eq!(split_full_name("Cher"), ("Cher".into(), String::new()));
    }
}
