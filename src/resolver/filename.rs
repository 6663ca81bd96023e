//! Output file names.

use crate::model::Group;

/// Characters rejected by common file systems.
const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Remove the characters in [`ILLEGAL`].
#[must_use]
pub fn strip_illegal(text: &str) -> String {
    text.chars().filter(|c| !ILLEGAL.contains(c)).collect()
}

/// Strip illegal characters, trim, and turn spaces into underscores.
#[must_use]
pub fn sanitize(text: &str) -> String {
    strip_illegal(text).trim().replace(' ', "_")
}

/// File-name token for a group: the student's name for one member, or
/// `Equipo_` followed by each member's first name token.
#[must_use]
pub fn group_token(group: &Group) -> String {
    let token = if group.is_team() {
        let firsts: Vec<&str> = group
            .members()
            .iter()
            .map(|m| m.split_whitespace().next().unwrap_or_default())
            .collect();
        format!("Equipo_{}", firsts.join("_"))
    } else {
        group
            .members()
            .first()
            .map(|m| m.replace(' ', "_"))
            .unwrap_or_default()
    };
    strip_illegal(&token)
}

/// `Factura_{task}_{course}_{group}.xlsx`
///
/// The course code is used as written; only characters illegal in file names are
/// removed from it.
#[must_use]
pub fn invoice_filename(task_name: &str, course_code: &str, group: &Group) -> String {
    format!(
        "Factura_{}_{}_{}.xlsx",
        sanitize(task_name),
        strip_illegal(course_code),
        group_token(group)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn team(names: &[&str]) -> Group {
        Group::new(names.iter().map(ToString::to_string).collect()).unwrap()
    }

    #[test_case("Tarea 1: Intro/Basics", "Tarea_1_IntroBasics" ; "colon and slash")]
    #[test_case("  Proyecto  final ", "Proyecto__final" ; "inner spaces kept as underscores")]
    #[test_case(r#"a<b>c"d\e|f?g*h"#, "abcdefgh" ; "every illegal character")]
    #[test_case("Quiz ñandú", "Quiz_ñandú" ; "unicode untouched")]
    fn test_sanitize(input: &str, expected: &str) {
        assert_eq!(sanitize(input), expected);
    }

    #[test]
    fn test_team_filename() {
        let group = team(&["Pérez García", "Gómez Li"]);
        assert_eq!(
            invoice_filename("Tarea 1: Intro/Basics", "CE1101", &group),
            "Factura_Tarea_1_IntroBasics_CE1101_Equipo_Pérez_Gómez.xlsx"
        );
    }

    #[test]
    fn test_single_filename() {
        let group = Group::single("Mora Vargas Luis");
        assert_eq!(
            invoice_filename("Tarea 2", "IC-2001", &group),
            "Factura_Tarea_2_IC-2001_Mora_Vargas_Luis.xlsx"
        );
    }

    #[test]
    fn test_course_code_keeps_spaces() {
        let group = Group::single("Mora Luis");
        assert_eq!(
            invoice_filename("Tarea 1", "CE 1101", &group),
            "Factura_Tarea_1_CE 1101_Mora_Luis.xlsx"
        );
        assert_eq!(
            invoice_filename("Tarea 1", "CE/1101", &group),
            "Factura_Tarea_1_CE1101_Mora_Luis.xlsx"
        );
    }

    #[test]
    fn test_single_name_not_trimmed() {
        assert_eq!(group_token(&Group::single("Mora Luis ")), "Mora_Luis_");
    }

    #[test]
    fn test_group_token_strips_illegal_characters() {
        assert_eq!(group_token(&Group::single("O'Neil/Ana")), "O'NeilAna");
        assert_eq!(group_token(&team(&["A:b c", "D?e f"])), "Equipo_Ab_De");
    }
}
