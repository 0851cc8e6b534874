//! Static SF Muni route catalog.

use serde::Serialize;

use crate::domain::RouteTag;

/// A route offered by the search bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDetail {
    pub title: String,
    pub tag: RouteTag,
}

/// `(tag, title)` for every SF Muni route.
const SF_MUNI_ROUTES: &[(&str, &str)] = &[
    ("E", "E-Embarcadero"),
    ("F", "F-Market & Wharves"),
    ("J", "J-Church"),
    ("KT", "KT-Ingleside/Third Street"),
    ("L", "L-Taraval"),
    ("M", "M-Ocean View"),
    ("N", "N-Judah"),
    ("NX", "NX-Express"),
    ("1", "1-California"),
    ("1AX", "1AX-California A Express"),
    ("1BX", "1BX-California B Express"),
    ("2", "2-Clement"),
    ("3", "3-Jackson"),
    ("5", "5-Fulton"),
    ("5R", "5R-Fulton Rapid"),
    ("6", "6-Haight-Parnassus"),
    ("7", "7-Haight-Noriega"),
    ("7X", "7X-Noriega Express"),
    ("8", "8-Bayshore"),
    ("8AX", "8AX-Bayshore A Express"),
    ("8BX", "8BX-Bayshore B Express"),
    ("9", "9-San Bruno"),
    ("9R", "9R-San Bruno Rapid"),
    ("10", "10-Townsend"),
    ("12", "12-Folsom-Pacific"),
    ("14", "14-Mission"),
    ("14R", "14R-Mission Rapid"),
    ("14X", "14X-Mission Express"),
    ("18", "18-46th Avenue"),
    ("19", "19-Polk"),
    ("21", "21-Hayes"),
    ("22", "22-Fillmore"),
    ("23", "23-Monterey"),
    ("24", "24-Divisadero"),
    ("25", "25-Treasure Island"),
    ("27", "27-Bryant"),
    ("28", "28-19th Avenue"),
    ("28R", "28R-19th Avenue Rapid"),
    ("29", "29-Sunset"),
    ("30", "30-Stockton"),
    ("30X", "30X-Marina Express"),
    ("31", "31-Balboa"),
    ("33", "33-Ashbury-18th St"),
    ("35", "35-Eureka"),
    ("36", "36-Teresita"),
    ("37", "37-Corbett"),
    ("38", "38-Geary"),
    ("38R", "38R-Geary Rapid"),
    ("39", "39-Coit"),
    ("41", "41-Union"),
    ("43", "43-Masonic"),
    ("44", "44-O'Shaughnessy"),
    ("45", "45-Union-Stockton"),
    ("47", "47-Van Ness"),
    ("48", "48-Quintara-24th Street"),
    ("49", "49-Van Ness-Mission"),
    ("52", "52-Excelsior"),
    ("54", "54-Felton"),
    ("55", "55-16th Street"),
    ("56", "56-Rutland"),
    ("57", "57-Parkmerced"),
    ("66", "66-Quintara"),
    ("67", "67-Bernal Heights"),
    ("81X", "81X-Caltrain Express"),
    ("82X", "82X-Levi Plaza Express"),
    ("83X", "83X-Mid-Market Express"),
    ("88", "88-Bart Shuttle"),
    ("90", "90-San Bruno Owl"),
    ("91", "91-3rd-19th Ave Owl"),
    ("C", "California Street Cable Car"),
    ("PH", "Powell/Hyde Cable Car"),
    ("PM", "Powell/Mason Cable Car"),
];

/// In-memory list of routes, searchable by tag.
#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    routes: Vec<RouteDetail>,
}

impl RouteCatalog {
    pub fn new(routes: Vec<RouteDetail>) -> Self {
        Self { routes }
    }

    /// The SF Muni route list.
    pub fn sf_muni() -> Self {
        Self::from_pairs(SF_MUNI_ROUTES.iter().copied())
    }

    /// Build a catalog from `(tag, title)` pairs, skipping invalid tags.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let routes = pairs
            .into_iter()
            .filter_map(|(tag, title)| {
                RouteTag::parse(tag).ok().map(|tag| RouteDetail {
                    title: title.to_string(),
                    tag,
                })
            })
            .collect();
        Self { routes }
    }

    pub fn routes(&self) -> &[RouteDetail] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Look up a route by its exact tag.
    pub fn find(&self, tag: &RouteTag) -> Option<&RouteDetail> {
        self.routes.iter().find(|r| &r.tag == tag)
    }

    /// Routes whose tag contains `query`, in catalog order.
    ///
    /// Matching is case-sensitive and the query is not trimmed, so `"kt"`
    /// finds nothing while `"KT"` finds the KT line. An empty query matches
    /// nothing.
    pub fn filter(&self, query: &str) -> Vec<&RouteDetail> {
        if query.is_empty() {
            return Vec::new();
        }

        self.routes
            .iter()
            .filter(|r| r.tag.as_str().contains(query))
            .collect()
    }
}
