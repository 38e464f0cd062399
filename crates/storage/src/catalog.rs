use trivia_core::model::QuestionSeed;

fn seed(text: &str, answer: &str, options: &[&str], category: &str) -> QuestionSeed {
    QuestionSeed {
        text: text.to_owned(),
        correct_answer: answer.to_owned(),
        options: options.iter().map(|s| (*s).to_owned()).collect(),
        category: category.to_owned(),
    }
}

/// The built-in Twenty One Pilots question set, imported at startup when the
/// questions table is empty.
#[must_use]
pub fn default_catalog() -> Vec<QuestionSeed> {
    vec![
        seed(
            "What is the name of Tyler Joseph's ukulele?",
            "Lehua",
            &["Coco", "Lehua", "Stitch", "Uke"],
            "Band",
        ),
        seed(
            "Which album features the song 'Stressed Out'?",
            "Blurryface",
            &["Vessel", "Trench", "Blurryface", "Scaled and Icy"],
            "Music",
        ),
        seed(
            "What is the fictional city central to the Trench era lore?",
            "Dema",
            &["Voldsoy", "Dema", "Keons", "Nico"],
            "Lore",
        ),
        seed(
            "Who is the drummer of Twenty One Pilots?",
            "Josh Dun",
            &["Tyler Joseph", "Chris Salih", "Nick Thomas", "Josh Dun"],
            "Band",
        ),
        seed(
            "Which song contains the lyrics: 'The sun will rise and we will try again'?",
            "Truce",
            &["Goner", "Trees", "Truce", "Car Radio"],
            "Music",
        ),
        seed(
            "What is the color scheme associated with the 'Scaled and Icy' era?",
            "Pink and Blue",
            &[
                "Yellow and Black",
                "Red and Black",
                "Pink and Blue",
                "Green and Purple",
            ],
            "Lore",
        ),
        seed(
            "How many bishops are there in Dema?",
            "9",
            &["7", "9", "12", "5"],
            "Lore",
        ),
        seed(
            "What was the name of the band's debut self-titled album?",
            "Twenty One Pilots",
            &[
                "Regional at Best",
                "Vessel",
                "Twenty One Pilots",
                "No Phun Intended",
            ],
            "Music",
        ),
        seed(
            "Which character represents Tyler's insecurities in the Blurryface era?",
            "Blurryface",
            &["Nico", "Clancy", "Blurryface", "Ned"],
            "Lore",
        ),
        seed(
            "What is the name of the small alien creature that appears in the 'Chlorine' video?",
            "Ned",
            &["Fred", "Ned", "Ted", "Jim"],
            "Lore",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_ten_questions_with_valid_options() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 10);
        for q in &catalog {
            assert!(q.options.contains(&q.correct_answer));
            assert!(!q.category.is_empty());
        }
    }
}
