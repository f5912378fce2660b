//! Node Families and Node Types
//!
//! Every node belongs to exactly one tree family (categories or navigation)
//! and carries one type tag from a closed set. Tags are stored upper snake
//! case (`CATEGORY_LINK`) and presented to callers as lower-case kebab tokens
//! (`category-link`).
//!
//! Parsing is the boundary check: an unrecognized tag is rejected with
//! [`ValidationError::InvalidNodeType`] instead of falling back to a default.

use crate::models::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The tree a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeFamily {
    /// Product category tree
    Category,
    /// Site navigation (menu) tree
    Navigation,
}

impl NodeFamily {
    /// Stored representation (`CATEGORY` / `NAVIGATION`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeFamily::Category => "CATEGORY",
            NodeFamily::Navigation => "NAVIGATION",
        }
    }
}

impl fmt::Display for NodeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeFamily {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CATEGORY" => Ok(NodeFamily::Category),
            "NAVIGATION" => Ok(NodeFamily::Navigation),
            _ => Err(ValidationError::InvalidFamily(s.to_string())),
        }
    }
}

/// Closed set of node types across both families
///
/// Category types describe the product taxonomy; navigation types describe
/// what a menu entry links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    // Category family
    Department,
    Collection,
    Brand,
    Seasonal,

    // Navigation family
    CategoryLink,
    PageLink,
    ExternalLink,
    CustomLink,
}

impl NodeType {
    /// All variants, in display order
    pub const ALL: [NodeType; 8] = [
        NodeType::Department,
        NodeType::Collection,
        NodeType::Brand,
        NodeType::Seasonal,
        NodeType::CategoryLink,
        NodeType::PageLink,
        NodeType::ExternalLink,
        NodeType::CustomLink,
    ];

    /// Family this type belongs to
    pub fn family(&self) -> NodeFamily {
        match self {
            NodeType::Department | NodeType::Collection | NodeType::Brand | NodeType::Seasonal => {
                NodeFamily::Category
            }
            NodeType::CategoryLink
            | NodeType::PageLink
            | NodeType::ExternalLink
            | NodeType::CustomLink => NodeFamily::Navigation,
        }
    }

    /// Stored representation (upper snake case)
    pub fn as_stored(&self) -> &'static str {
        match self {
            NodeType::Department => "DEPARTMENT",
            NodeType::Collection => "COLLECTION",
            NodeType::Brand => "BRAND",
            NodeType::Seasonal => "SEASONAL",
            NodeType::CategoryLink => "CATEGORY_LINK",
            NodeType::PageLink => "PAGE_LINK",
            NodeType::ExternalLink => "EXTERNAL_LINK",
            NodeType::CustomLink => "CUSTOM_LINK",
        }
    }

    /// Caller-facing token (lower-case kebab)
    pub fn as_token(&self) -> &'static str {
        match self {
            NodeType::Department => "department",
            NodeType::Collection => "collection",
            NodeType::Brand => "brand",
            NodeType::Seasonal => "seasonal",
            NodeType::CategoryLink => "category-link",
            NodeType::PageLink => "page-link",
            NodeType::ExternalLink => "external-link",
            NodeType::CustomLink => "custom-link",
        }
    }

    /// Admin label shown next to the node
    pub fn label(&self) -> &'static str {
        match self {
            NodeType::Department => "Department",
            NodeType::Collection => "Collection",
            NodeType::Brand => "Brand",
            NodeType::Seasonal => "Seasonal",
            NodeType::CategoryLink => "Category Link",
            NodeType::PageLink => "Page Link",
            NodeType::ExternalLink => "External Link",
            NodeType::CustomLink => "Custom Link",
        }
    }

    /// Icon identifier used by admin listings
    pub fn icon(&self) -> &'static str {
        match self {
            NodeType::Department => "store",
            NodeType::Collection => "layers",
            NodeType::Brand => "tag",
            NodeType::Seasonal => "calendar",
            NodeType::CategoryLink => "folder",
            NodeType::PageLink => "file-text",
            NodeType::ExternalLink => "external-link",
            NodeType::CustomLink => "link",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    /// Accepts the stored form (`CATEGORY_LINK`) or the token form
    /// (`category-link`), case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        NodeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_stored() == normalized)
            .ok_or_else(|| ValidationError::InvalidNodeType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_and_token_forms() {
        assert_eq!(
            "CATEGORY_LINK".parse::<NodeType>().unwrap(),
            NodeType::CategoryLink
        );
        assert_eq!(
            "category-link".parse::<NodeType>().unwrap(),
            NodeType::CategoryLink
        );
        assert_eq!(
            " External_Link ".parse::<NodeType>().unwrap(),
            NodeType::ExternalLink
        );
        assert_eq!("brand".parse::<NodeType>().unwrap(), NodeType::Brand);
    }

    #[test]
    fn rejects_unknown_tags() {
        let err = "mega-menu".parse::<NodeType>().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNodeType(tag) if tag == "mega-menu"));
        assert!("".parse::<NodeType>().is_err());
    }

    #[test]
    fn every_type_round_trips_through_both_forms() {
        for t in NodeType::ALL {
            assert_eq!(t.as_stored().parse::<NodeType>().unwrap(), t);
            assert_eq!(t.as_token().parse::<NodeType>().unwrap(), t);
            assert!(!t.label().is_empty());
            assert!(!t.icon().is_empty());
        }
    }

    #[test]
    fn families_are_partitioned() {
        let categories: Vec<_> = NodeType::ALL
            .iter()
            .filter(|t| t.family() == NodeFamily::Category)
            .collect();
        assert_eq!(categories.len(), 4);
        assert_eq!(NodeType::PageLink.family(), NodeFamily::Navigation);
    }

    #[test]
    fn serde_uses_stored_form() {
        let json = serde_json::to_string(&NodeType::CustomLink).unwrap();
        assert_eq!(json, "\"CUSTOM_LINK\"");
        let family: NodeFamily = serde_json::from_str("\"NAVIGATION\"").unwrap();
        assert_eq!(family, NodeFamily::Navigation);
    }
}
