//! Announcement texts

use super::parts::PartId;
use crate::narration::{Announcement, AnnouncementKind};

/// Prompt readout, phrased per part
pub fn question(part: PartId, text: &str) -> Announcement {
    let spoken = match part {
        PartId::Interview => format!("Question: {}", text),
        PartId::PictureDescription => format!("Look at the picture and answer: {}", text),
        PartId::LongTurn => {
            // Cue cards are laid out with line breaks and bullets
            let flat = text.replace('\n', " ").replace('•', "");
            format!("Here is your topic: {}", flat)
        }
        PartId::Discussion => format!("Discussion question: {}", text),
    };
    Announcement::new(AnnouncementKind::Question, spoken)
}

pub fn transition(completed: PartId, next: PartId) -> Announcement {
    Announcement::new(
        AnnouncementKind::Transition,
        format!(
            "Part {} finished. Now preparing for Part {}.",
            completed.key(),
            next.key()
        ),
    )
}

pub fn completion(last: PartId) -> Announcement {
    Announcement::new(
        AnnouncementKind::Completion,
        format!("Part {} finished. Test completed. Thank you.", last.key()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_prefix_per_part() {
        assert_eq!(question(PartId::Interview, "Where are you from?").text, "Question: Where are you from?");
        assert_eq!(
            question(PartId::PictureDescription, "What is happening?").text,
            "Look at the picture and answer: What is happening?"
        );
        assert_eq!(
            question(PartId::Discussion, "Is technology good?").text,
            "Discussion question: Is technology good?"
        );
    }

    #[test]
    fn test_cue_card_is_flattened() {
        let card = "Describe a journey.\nYou should say:\n• Where you went\n• Who with";
        let spoken = question(PartId::LongTurn, card);
        assert_eq!(
            spoken.text,
            "Here is your topic: Describe a journey. You should say:  Where you went  Who with"
        );
        assert_eq!(spoken.kind, AnnouncementKind::Question);
    }

    #[test]
    fn test_transition_and_completion_texts() {
        let t = transition(PartId::PictureDescription, PartId::LongTurn);
        assert_eq!(t.text, "Part 1.2 finished. Now preparing for Part 2.");
        assert_eq!(t.kind, AnnouncementKind::Transition);

        let c = completion(PartId::Discussion);
        assert_eq!(c.text, "Part 3 finished. Test completed. Thank you.");
        assert_eq!(c.kind.rate(), 0.8);
    }
}
