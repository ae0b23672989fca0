use serde::{Deserialize, Serialize};

use super::reference::string_or_number;

const SINGLE_LESSONS: [&str; 4] = ["45MIN LESSON", "1HR LESSON", "1.5HR LESSON", "2HR LESSON"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub maximum_slots_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Billing {
    PerSlot,
    Flat,
}

/// Constants a package imposes on slot selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRules {
    pub max_slots: usize,
    pub duration: u32,
    pub margin: u32,
    pub billing: Billing,
}

impl PackageRules {
    /// Distance between consecutive bookable starts on the grid.
    pub fn total_step(&self) -> i64 {
        i64::from(self.duration) + i64::from(self.margin)
    }
}

impl Package {
    pub fn is_single_lesson(&self) -> bool {
        SINGLE_LESSONS.contains(&self.name.as_str())
    }

    pub fn rules(&self) -> PackageRules {
        PackageRules {
            max_slots: self.max_slots(),
            duration: self.duration(),
            margin: self.margin(),
            billing: if self.is_single_lesson() {
                Billing::PerSlot
            } else {
                Billing::Flat
            },
        }
    }

    fn max_slots(&self) -> usize {
        let name = self.name.as_str();
        if name.contains("5 X 1HR") {
            5
        } else if name.contains("10 X 1HR") {
            10
        } else if name.contains("3 X 1HR") {
            3
        } else if self.is_single_lesson() {
            10
        } else {
            self.maximum_slots_count.max(1) as usize
        }
    }

    fn margin(&self) -> u32 {
        match self.name.as_str() {
            "45MIN LESSON" | "1HR LESSON" => 15,
            "1.5HR LESSON" | "2HR LESSON" => 30,
            name if name.contains("2HR") => 30,
            _ => 15,
        }
    }

    fn duration(&self) -> u32 {
        let name = self.name.as_str();
        if name.contains("45MIN") {
            45
        } else if name.contains("1.5HR") {
            90
        } else if name.contains("2HR") {
            120
        } else {
            60
        }
    }

    /// Amount charged for `selected` slots under this package.
    pub fn total_price(&self, selected: usize) -> f64 {
        match self.rules().billing {
            Billing::PerSlot => self.price * selected.max(1) as f64,
            Billing::Flat => self.price,
        }
    }
}
