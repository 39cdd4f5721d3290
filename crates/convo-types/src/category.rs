//! Fixed category enumeration for threads and topics.

use serde::{Deserialize, Serialize};

/// Subject category for a thread or topic.
///
/// The set is fixed; anything the model returns outside it normalizes to
/// [`Category::Logistics`], the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Safety,
    Medical,
    Schedule,
    Education,
    Finances,
    Activities,
    Travel,
    CoParenting,
    Logistics,
}

impl Default for Category {
    fn default() -> Self {
        Category::Logistics
    }
}

impl Category {
    /// All categories in severity order (highest priority first).
    /// This is also the listing order for grouped thread views.
    pub fn all() -> &'static [Category] {
        &[
            Category::Safety,
            Category::Medical,
            Category::Schedule,
            Category::Education,
            Category::Finances,
            Category::Activities,
            Category::Travel,
            Category::CoParenting,
            Category::Logistics,
        ]
    }

    /// Rank within the severity order; lower sorts first.
    pub fn severity_rank(&self) -> usize {
        Self::all().iter().position(|c| c == self).unwrap_or(usize::MAX)
    }

    /// Wire name (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Safety => "safety",
            Category::Medical => "medical",
            Category::Schedule => "schedule",
            Category::Education => "education",
            Category::Finances => "finances",
            Category::Activities => "activities",
            Category::Travel => "travel",
            Category::CoParenting => "co-parenting",
            Category::Logistics => "logistics",
        }
    }

    /// Parse a wire name, returning the default for anything unrecognized.
    pub fn normalize(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "safety" => Category::Safety,
            "medical" => Category::Medical,
            "schedule" => Category::Schedule,
            "education" | "school" => Category::Education,
            "finances" | "financial" => Category::Finances,
            "activities" => Category::Activities,
            "travel" => Category::Travel,
            "co-parenting" | "coparenting" => Category::CoParenting,
            "logistics" => Category::Logistics,
            _ => Category::default(),
        }
    }

    /// One-line description used in analysis prompts.
    pub fn description(&self) -> &'static str {
        match self {
            Category::Safety => "Emergency contacts, safety concerns, urgent issues",
            Category::Medical => "Doctor appointments, health issues, medications, therapy",
            Category::Schedule => "Pickup, dropoff, custody timing, weekend plans",
            Category::Education => "School, homework, grades, teachers, tutoring",
            Category::Finances => "Child support, shared expenses, reimbursements, bills",
            Category::Activities => "Sports, hobbies, extracurriculars, lessons, camps",
            Category::Travel => "Vacations, trips, travel arrangements, passports",
            Category::CoParenting => "Relationship discussions, parenting decisions, boundaries",
            Category::Logistics => "General coordination, supplies, belongings, miscellaneous",
        }
    }

    /// Keywords used by heuristic category inference.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Safety => &["emergency", "urgent", "safety", "danger", "police"],
            Category::Medical => &[
                "doctor",
                "appointment",
                "medication",
                "sick",
                "fever",
                "health",
                "hospital",
                "therapy",
                "dentist",
            ],
            Category::Schedule => &[
                "pickup", "drop off", "dropoff", "custody", "weekend", "schedule",
            ],
            Category::Education => &[
                "school",
                "homework",
                "teacher",
                "class",
                "grade",
                "test",
                "exam",
                "assignment",
                "tutoring",
            ],
            Category::Finances => &[
                "money",
                "pay",
                "cost",
                "expense",
                "bill",
                "$",
                "fee",
                "reimburse",
                "support",
            ],
            Category::Activities => &[
                "soccer",
                "basketball",
                "practice",
                "game",
                "piano",
                "lesson",
                "camp",
                "birthday",
                "party",
            ],
            Category::Travel => &["vacation", "trip", "flight", "passport", "visit"],
            Category::CoParenting => &["boundaries", "parenting", "decision", "communication"],
            Category::Logistics => &[],
        }
    }

    /// Infer a category from text by keyword hit count; highest scoring
    /// category wins, ties resolve to the higher-severity one, and no
    /// hits yield the default. Matching is case-insensitive.
    pub fn infer(text: &str) -> Self {
        let lower = text.to_lowercase();
        let mut best = Category::default();
        let mut best_score = 0usize;

        for category in Self::all() {
            let score = category
                .keywords()
                .iter()
                .filter(|kw| lower.contains(*kw))
                .count();
            if score > best_score {
                best = *category;
                best_score = score;
            }
        }

        best
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
