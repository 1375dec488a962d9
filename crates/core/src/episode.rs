//! The published episode catalogue.
//!
//! Episodes are numbered by `sequence` starting at 1 and released weekly.
//! A handful are free to everyone; the rest require an active subscription
//! or a redeemed episode credit.

use chrono::{Days, NaiveDate};
use serde::Serialize;

/// Who may watch an episode without a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Free,
    Subscriber,
}

/// A single published episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Episode {
    pub sequence: i32,
    pub title: &'static str,
    pub blurb: &'static str,
    /// Running time in seconds.
    pub length: u32,
    pub permission: Permission,
}

const fn ep(
    sequence: i32,
    title: &'static str,
    blurb: &'static str,
    length: u32,
    permission: Permission,
) -> Episode {
    Episode {
        sequence,
        title,
        blurb,
        length,
        permission,
    }
}

use Permission::{Free, Subscriber};

static CATALOGUE: &[Episode] = &[
    ep(1, "Functions", "Our first episode is all about functions! We talk a bit about what makes functions special, contrast them with the way we usually write code, and have some exploratory discussions about operators and composition.", 1_184, Free),
    ep(2, "Side Effects", "Side effects: can't live with 'em; can't write a program without 'em. Let's explore a few kinds of side effects we encounter every day and why they make code difficult to reason about and test.", 2_630, Free),
    ep(3, "Styling with Functions", "We bring tools from previous episodes down to earth and apply them to an everyday task: styling views.", 1_614, Subscriber),
    ep(4, "Algebraic Data Types", "What does the Swift type system have to do with algebra? A lot! We begin to explore this correspondence and see how it can help us create type-safe data structures.", 2_172, Subscriber),
    ep(5, "Higher-Order Functions", "Most of the time we interact with code we did not write, and it does not always play nicely with the types of compositions we have developed. We explore higher-order functions that help fill the gaps.", 1_607, Subscriber),
    ep(6, "Functional Setters", "The programs we write can be reduced to transforming data from one form into another. We are used to transforming data externally; functional setters let us transform nested data from the inside.", 1_901, Subscriber),
    ep(7, "Setters and Key Paths", "This week we explore how functional setters can be used with the types we build every day.", 1_458, Subscriber),
    ep(8, "Getters and Key Paths", "Key paths are compiler-generated code with a lot of potential. We explore how they relate to getter functions and how they can be used in everyday code.", 1_283, Subscriber),
    ep(9, "Algebraic Data Types: Exponents", "We continue our exploration of algebra and the type system by looking at the next fundamental operation: exponentiation.", 2_325, Subscriber),
    ep(10, "A Tale of Two Flat-Maps", "Swift introduced a change that renamed a particular form of flatMap. We use this as an opportunity to understand what flatMap is and why it matters.", 1_637, Free),
    ep(11, "Composition without Operators", "While we unabashedly promote custom operators in this series, we understand that not every codebase can adopt them. This week we look at the same function composition we love, but expressed without operators.", 1_040, Subscriber),
    ep(12, "Tagged", "We often work with types that are far too general or hold far too many values than what is necessary for our domain. We show how a simple generic type can improve the safety of our code.", 1_651, Subscriber),
    ep(13, "The Many Faces of Map", "Why does the map function appear in every programming language supporting generics? We look at what it means to be a map and why it is so important.", 1_817, Subscriber),
    ep(14, "Contravariance", "Let's explore a type of composition that defies our intuitions. It appears to go in the opposite direction than we are used to.", 2_443, Subscriber),
    ep(15, "Setters: Ergonomics & Performance", "Functional setters can be very powerful, but the way we have defined them so far is not super ergonomic or performant.", 1_436, Subscriber),
    ep(16, "Dependency Injection Made Easy", "Today we are going to control the world! Well, dependencies to the outside world, at least.", 1_760, Free),
    ep(17, "Styling with Overture", "We revisit an old topic: styling views. This time we apply a library of composition functions to make the styling code read nicely.", 1_134, Subscriber),
    ep(18, "Dependency Injection Made Comfortable", "Let's have some fun with the environment! We show how a single mutable value can make testing code with dependencies pleasant.", 1_473, Subscriber),
    ep(19, "Algebraic Data Types: Generics and Recursion", "Our third installment of algebraic data types explores how generics and recursive data types manifest themselves in algebra.", 2_330, Subscriber),
    ep(20, "NonEmpty", "We often deal with collections that we know can never be empty, yet we use arrays to model them. Using the ideas from our last episode, we build a type that guarantees at least one value.", 2_213, Subscriber),
    ep(21, "Playground Driven Development", "We use playgrounds to build entire screens of our application in isolation, giving us a fast feedback loop for design work.", 1_478, Free),
    ep(22, "A Tour of the Site", "Join us for a tour of the code base that powers this very site. We show how the ideas from past episodes come together in a real production application.", 2_287, Free),
    ep(23, "The Many Faces of Zip: Part 1", "The zip function comes with the standard library, but it is far more universal than most people realize.", 1_778, Subscriber),
    ep(24, "The Many Faces of Zip: Part 2", "In part two of our series on zip we show that many types support a zip-like operation, and some even support multiple distinct implementations.", 1_523, Subscriber),
    ep(25, "The Many Faces of Zip: Part 3", "The third and final part of our introductory series on zip finally answers the question: what's the point?", 1_861, Subscriber),
    ep(26, "Domain Specific Languages: Part 1", "We interact with domain specific languages on a daily basis, but what does it take to build one from scratch?", 1_538, Subscriber),
    ep(27, "Domain Specific Languages: Part 2", "We finish our introduction to domain specific languages by adding variables and showing how to interpret them.", 1_941, Subscriber),
    ep(28, "An HTML DSL", "This week we apply domain specific languages to a very real-world problem: representing and rendering HTML.", 1_748, Subscriber),
];

/// Date the first episode was published; one episode follows each week.
const FIRST_PUBLISHED: (i32, u32, u32) = (2018, 1, 29);

impl Episode {
    /// Every published episode in sequence order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        CATALOGUE
    }

    /// Look up an episode by its sequence number.
    #[must_use]
    pub fn find(sequence: i32) -> Option<&'static Self> {
        CATALOGUE.iter().find(|e| e.sequence == sequence)
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.permission, Permission::Free)
    }

    /// URL slug, e.g. `ep12-tagged`.
    #[must_use]
    pub fn slug(&self) -> String {
        let words: Vec<String> = self
            .title
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        format!("ep{}-{}", self.sequence, words.join("-"))
    }

    /// Running time rounded down to whole minutes.
    #[must_use]
    pub const fn minutes(&self) -> u32 {
        self.length / 60
    }

    /// Publication date.
    #[must_use]
    pub fn published_on(&self) -> NaiveDate {
        let (y, m, d) = FIRST_PUBLISHED;
        let weeks = u64::try_from(self.sequence.saturating_sub(1)).unwrap_or(0);
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|first| first.checked_add_days(Days::new(weeks * 7)))
            .unwrap_or_default()
    }
}

/// Aggregate numbers shown on marketing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpisodeStats {
    pub all_episode_count: usize,
    pub episode_hour_count: u32,
    pub free_episode_count: usize,
}

impl EpisodeStats {
    /// Compute stats over a set of episodes.
    #[must_use]
    pub fn for_episodes(episodes: &[Episode]) -> Self {
        let seconds: u32 = episodes.iter().map(|e| e.length).sum();
        Self {
            all_episode_count: episodes.len(),
            episode_hour_count: seconds / 3600,
            free_episode_count: episodes.iter().filter(|e| e.is_free()).count(),
        }
    }

    /// Stats for the whole catalogue.
    #[must_use]
    pub fn current() -> Self {
        Self::for_episodes(Episode::all())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_in_sequence_order() {
        for (i, episode) in Episode::all().iter().enumerate() {
            assert_eq!(episode.sequence, i32::try_from(i).unwrap() + 1);
        }
    }

    #[test]
    fn test_find() {
        assert_eq!(Episode::find(12).unwrap().title, "Tagged");
        assert!(Episode::find(0).is_none());
        assert!(Episode::find(10_000).is_none());
    }

    #[test]
    fn test_slug() {
        let ep = Episode::find(15).unwrap();
        assert_eq!(ep.slug(), "ep15-setters-ergonomics-performance");
    }

    #[test]
    fn test_published_on_is_weekly() {
        let first = Episode::find(1).unwrap().published_on();
        let third = Episode::find(3).unwrap().published_on();
        assert_eq!(first, NaiveDate::from_ymd_opt(2018, 1, 29).unwrap());
        assert_eq!((third - first).num_days(), 14);
    }

    #[test]
    fn test_stats() {
        let episodes = [
            ep(1, "A", "", 3_600, Free),
            ep(2, "B", "", 1_800, Subscriber),
            ep(3, "C", "", 1_800, Subscriber),
        ];
        let stats = EpisodeStats::for_episodes(&episodes);
        assert_eq!(stats.all_episode_count, 3);
        assert_eq!(stats.episode_hour_count, 2);
        assert_eq!(stats.free_episode_count, 1);
    }
}
