use serde::{Serialize, Serializer, ser::SerializeStruct};

/// Top-level sections of the site catalog, each with a fixed list of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogSection {
    Jobs,
    Gigs,
    Tutoring,
    Directory,
}

impl CatalogSection {
    pub const ALL: [CatalogSection; 4] = [
        CatalogSection::Jobs,
        CatalogSection::Gigs,
        CatalogSection::Tutoring,
        CatalogSection::Directory,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            CatalogSection::Jobs => "Jobs",
            CatalogSection::Gigs => "Gigs",
            CatalogSection::Tutoring => "AI Tutoring",
            CatalogSection::Directory => "Directory",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            CatalogSection::Jobs => "jobs",
            CatalogSection::Gigs => "gigs",
            CatalogSection::Tutoring => "tutoring",
            CatalogSection::Directory => "directory",
        }
    }

    pub fn items(&self) -> &'static [&'static str] {
        match self {
            CatalogSection::Jobs => &[
                "Engineering",
                "Design",
                "Marketing",
                "Sales",
                "Customer Support",
                "Education",
            ],
            CatalogSection::Gigs => &[
                "Home Repair",
                "Cleaning",
                "Moving",
                "Delivery",
                "Tutoring",
                "Pet Care",
            ],
            CatalogSection::Tutoring => &["Upload Material", "My Lessons", "Quizzes", "Progress"],
            CatalogSection::Directory => &["Skilled Workers", "Businesses", "Schools"],
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }
}

impl Serialize for CatalogSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CatalogSection", 3)?;
        state.serialize_field("slug", self.slug())?;
        state.serialize_field("title", self.title())?;
        state.serialize_field("items", self.items())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_section_round_trips_through_its_slug() {
        for section in CatalogSection::ALL {
            assert_eq!(CatalogSection::from_slug(section.slug()), Some(section));
            assert!(!section.items().is_empty());
        }
        assert_eq!(CatalogSection::from_slug("admin"), None);
    }

    #[test]
    fn serializes_with_items() {
        let json = serde_json::to_value(CatalogSection::Directory).unwrap();
        assert_eq!(json["slug"], "directory");
        assert_eq!(json["items"][0], "Skilled Workers");
    }
}
