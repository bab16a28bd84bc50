pub struct Faq {
    pub question: &'static str,
    pub answer: &'static str,
}

pub const FAQS: &[Faq] = &[
    Faq {
        question: "What is 7chalo and how does it work?",
        answer: "7chalo is a ride-sharing platform that connects people from nearby organizations to share rides together. Users can either offer rides as a Captain or join rides as a Passenger, helping to reduce travel costs and environmental impact.",
    },
    Faq {
        question: "How do I switch between Captain and Passenger modes?",
        answer: "Run `chalo role switch`, or pick a mode explicitly with `chalo role set captain` or `chalo role set passenger`. As a Captain, you can offer rides, while as a Passenger, you can search for and join available rides.",
    },
    Faq {
        question: "How is the ride fare calculated?",
        answer: "Ride fares are calculated based on the distance of the journey and are split fairly among all passengers. The app promotes cost-sharing rather than profit-making, helping everyone save on fuel costs.",
    },
    Faq {
        question: "Is my personal information secure?",
        answer: "Yes, we take your privacy seriously. We only share necessary information with your ride partners and implement strict security measures to protect your personal data.",
    },
    Faq {
        question: "What safety measures are in place?",
        answer: "We verify all users through their organizational credentials, track rides in real-time, and have an emergency support system. Users can also rate their ride experience and report any concerns.",
    },
    Faq {
        question: "How does the tree planting initiative work?",
        answer: "For every ride shared through 7chalo, we calculate the carbon emissions saved and convert it into virtual trees planted. This helps visualize your positive environmental impact.",
    },
    Faq {
        question: "What happens if I need to cancel a ride?",
        answer: "You can cancel a ride up to 30 minutes before the scheduled departure time. We encourage giving advance notice to allow other users to make alternative arrangements.",
    },
    Faq {
        question: "How do I earn badges and improve my rating?",
        answer: "Badges and ratings are earned through consistent positive behavior, such as completing rides on time, maintaining good ratings from co-riders, and regular participation in ride sharing.",
    },
];

/// Entries whose question or answer mentions `term`, case-insensitively
pub fn search(term: &str) -> Vec<&'static Faq> {
    let needle = term.to_lowercase();
    FAQS.iter()
        .filter(|faq| {
            faq.question.to_lowercase().contains(&needle)
                || faq.answer.to_lowercase().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search() {
        assert_eq!(search("").len(), FAQS.len());
        let hits = search("BADGES");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].question.contains("badges"));
        assert!(search("teleport").is_empty());
    }
}
