//! AttributeInferencer: gender and profession from context windows
//!
//! Both are read from the context windows of a character's occurrences.
//! Gender is a straight vote between masculine and feminine markers; a tie
//! (including no markers at all) stays `unknown`. Profession walks the
//! ordered profession table and stops at the first row that matches.

use crate::model::{CanonicalCharacter, Gender, RawOccurrence, PROFESSION_KEY};
use crate::rules::CompiledRules;

pub struct AttributeInferencer<'a> {
    rules: &'a CompiledRules,
}

impl<'a> AttributeInferencer<'a> {
    pub fn new(rules: &'a CompiledRules) -> Self {
        Self { rules }
    }

    pub fn infer_gender<'t>(&self, windows: impl IntoIterator<Item = &'t str>) -> Gender {
        let (masculine, feminine) = windows
            .into_iter()
            .map(|w| self.rules.count_gender_markers(w))
            .fold((0, 0), |(m, f), (dm, df)| (m + dm, f + df));

        match masculine.cmp(&feminine) {
            std::cmp::Ordering::Greater => Gender::Male,
            std::cmp::Ordering::Less => Gender::Female,
            std::cmp::Ordering::Equal => Gender::Unknown,
        }
    }

    /// First profession row with a marker in any window
    pub fn infer_profession(&self, windows: &[&str]) -> Option<&'a str> {
        self.rules
            .professions()
            .iter()
            .find(|row| windows.iter().any(|w| row.regex.is_match(w)))
            .map(|row| row.profession.as_str())
    }

    /// Fill `gender` and the profession attribute of `character`
    pub fn apply(&self, character: &mut CanonicalCharacter, occurrences: &[RawOccurrence]) {
        let windows: Vec<&str> = character
            .occurrence_refs
            .iter()
            .filter_map(|r| occurrences.get(r.index))
            .map(|o| o.context_window.as_str())
            .collect();

        character.gender = self.infer_gender(windows.iter().copied());
        if let Some(profession) = self.infer_profession(&windows) {
            character
                .attributes
                .insert(PROFESSION_KEY.to_string(), profession.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_vote() {
        let rules = CompiledRules::chinese().unwrap();
        let inferencer = AttributeInferencer::new(&rules);

        assert_eq!(inferencer.infer_gender(["莫凡笑了，他转身离开"]), Gender::Male);
        assert_eq!(
            inferencer.infer_gender(["叶心夏低下头，她轻声说", "她是圣女"]),
            Gender::Female
        );
        // tie stays unknown
        assert_eq!(inferencer.infer_gender(["他看着她"]), Gender::Unknown);
        assert_eq!(inferencer.infer_gender(Vec::<&str>::new()), Gender::Unknown);
    }

    #[test]
    fn test_profession_first_row_wins() {
        let rules = CompiledRules::chinese().unwrap();
        let inferencer = AttributeInferencer::new(&rules);

        // the 老师 row comes before the 医生 row
        let windows = ["唐月是医生，也是老师"];
        assert_eq!(inferencer.infer_profession(&windows), Some("teacher"));
        assert_eq!(inferencer.infer_profession(&["掌柜笑着迎客"]), Some("merchant"));
        assert_eq!(inferencer.infer_profession(&["莫凡走了"]), None);
    }
}
