use geo::Line;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use crate::error::{NavError, NavResult};
use crate::types::{FloorId, WorldPoint};

/// One wall of a floor plan, in raw floor-plan coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: WorldPoint,
    pub end: WorldPoint,
}

impl WallSegment {
    pub fn new(start: (f64, f64), end: (f64, f64)) -> Self {
        WallSegment {
            start: WorldPoint { x: start.0, y: start.1 },
            end: WorldPoint { x: end.0, y: end.1 },
        }
    }

    pub fn line(&self) -> Line<f64> {
        Line::new(self.start, self.end)
    }

    pub fn is_degenerate(&self) -> bool {
        self.length_sq() < 1e-12
    }

    fn length_sq(&self) -> f64 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        dx * dx + dy * dy
    }

    /// Squared distance from `point` to the closest point of the segment.
    ///
    /// Zero-length walls fall back to point-to-point distance.
    pub fn distance_sq_to(&self, point: WorldPoint) -> f64 {
        let x0 = point.x - self.start.x;
        let y0 = point.y - self.start.y;

        let length_sq = self.length_sq();
        if length_sq < 1e-12 {
            return x0 * x0 + y0 * y0;
        }

        let x1 = self.end.x - self.start.x;
        let y1 = self.end.y - self.start.y;

        // Projection parameter clamped onto the segment
        let t = ((x0 * x1 + y0 * y1) / length_sq).clamp(0.0, 1.0);

        let dx = x0 - x1 * t;
        let dy = y0 - y1 * t;
        dx * dx + dy * dy
    }

    pub fn distance_to(&self, point: WorldPoint) -> f64 {
        self.distance_sq_to(point).sqrt()
    }
}

/// Door of a room, the point routes are planned to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entrance {
    pub room_number: String,
    pub name: String,
    pub position: WorldPoint,
}

/// Rendering parameters and extent of one floor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorMetadata {
    pub id: FloorId,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub rotation_degrees: f64,
    /// Raw floor-plan extent, in floor-plan units
    pub width: f64,
    pub height: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// Room the user wants to reach.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub floor: FloorId,
    pub room_number: Option<String>,
    pub name: String,
}

impl Destination {
    pub fn new(floor: impl Into<FloorId>, room_number: Option<&str>, name: &str) -> Self {
        Destination {
            floor: floor.into(),
            room_number: room_number.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Label used in errors and logs.
    pub fn label(&self) -> String {
        match &self.room_number {
            Some(number) => format!("{} ({})", number, self.name),
            None => self.name.clone(),
        }
    }
}

/// Everything the engine knows about one floor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorPlan {
    #[serde(flatten)]
    pub metadata: FloorMetadata,
    #[serde(default)]
    pub walls: Vec<WallSegment>,
    #[serde(default)]
    pub entrances: Vec<Entrance>,
}

impl FloorPlan {
    pub fn id(&self) -> &FloorId {
        &self.metadata.id
    }

    /// Find the entrance for `destination`.
    ///
    /// Room number wins; otherwise the first entrance whose name matches
    /// case-insensitively.
    pub fn find_entrance(&self, destination: &Destination) -> NavResult<&Entrance> {
        if let Some(number) = destination.room_number.as_deref() {
            let number = number.trim();
            if !number.is_empty() {
                if let Some(entrance) = self
                    .entrances
                    .iter()
                    .find(|e| e.room_number.trim() == number)
                {
                    return Ok(entrance);
                }
            }
        }

        let wanted = destination.name.trim().to_lowercase();
        if !wanted.is_empty() {
            if let Some(entrance) = self
                .entrances
                .iter()
                .find(|e| e.name.trim().to_lowercase() == wanted)
            {
                return Ok(entrance);
            }
        }

        Err(NavError::NoEntranceMatched {
            room: destination.label(),
        })
    }
}

#[derive(Deserialize)]
struct CatalogDocument {
    floors: Vec<FloorPlan>,
}

/// Registry of loaded floors, keyed by floor id.
#[derive(Clone, Debug, Default)]
pub struct FloorCatalog {
    floors: HashMap<FloorId, Arc<FloorPlan>>,
}

impl FloorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_floors(floors: impl IntoIterator<Item = FloorPlan>) -> Self {
        let mut catalog = FloorCatalog::new();
        for floor in floors {
            catalog.insert(floor);
        }
        catalog
    }

    /// Parse a catalog document: `{"floors": [...]}`.
    pub fn from_json_reader<R: Read>(reader: R) -> NavResult<Self> {
        let document: CatalogDocument = serde_json::from_reader(reader)
            .map_err(|e| NavError::InvalidConfig(format!("Failed to parse floor data: {}", e)))?;
        Ok(Self::from_floors(document.floors))
    }

    pub fn insert(&mut self, floor: FloorPlan) {
        let degenerate = floor.walls.iter().filter(|w| w.is_degenerate()).count();
        if degenerate > 0 {
            log::warn!(
                "Floor {} has {} zero-length wall(s); treating them as points",
                floor.id(),
                degenerate
            );
        }
        self.floors.insert(floor.id().clone(), Arc::new(floor));
    }

    pub fn get(&self, id: &FloorId) -> NavResult<Arc<FloorPlan>> {
        self.floors
            .get(id)
            .cloned()
            .ok_or_else(|| NavError::MissingFloorData { floor: id.clone() })
    }

    pub fn floor_ids(&self) -> impl Iterator<Item = &FloorId> {
        self.floors.keys()
    }

    pub fn len(&self) -> usize {
        self.floors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_floor() -> FloorPlan {
        FloorPlan {
            metadata: FloorMetadata {
                id: FloorId::new("L1"),
                scale: 1.0,
                rotation_degrees: 0.0,
                width: 100.0,
                height: 100.0,
            },
            walls: vec![WallSegment::new((0.0, 0.0), (100.0, 0.0))],
            entrances: vec![
                Entrance {
                    room_number: "101".to_string(),
                    name: "Lecture Hall".to_string(),
                    position: WorldPoint { x: 10.0, y: 20.0 },
                },
                Entrance {
                    room_number: "102".to_string(),
                    name: "Library".to_string(),
                    position: WorldPoint { x: 50.0, y: 20.0 },
                },
            ],
        }
    }

    #[test]
    fn test_point_to_segment_distance() {
        let wall = WallSegment::new((0.0, 0.0), (10.0, 0.0));
        assert_abs_diff_eq!(wall.distance_to(WorldPoint { x: 5.0, y: 3.0 }), 3.0, epsilon = 1e-12);
        // Beyond the end: distance to the endpoint
        assert_abs_diff_eq!(wall.distance_to(WorldPoint { x: 13.0, y: 4.0 }), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_wall_is_point() {
        let wall = WallSegment::new((2.0, 2.0), (2.0, 2.0));
        assert!(wall.is_degenerate());
        assert_abs_diff_eq!(wall.distance_to(WorldPoint { x: 5.0, y: 6.0 }), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_entrance_by_room_number_first() {
        let floor = sample_floor();
        // Number points at 102 even though the name says otherwise
        let dest = Destination::new("L1", Some("102"), "Lecture Hall");
        assert_eq!(floor.find_entrance(&dest).unwrap().name, "Library");
    }

    #[test]
    fn test_entrance_name_fallback_case_insensitive() {
        let floor = sample_floor();
        let dest = Destination::new("L1", Some("999"), "lecture HALL");
        assert_eq!(floor.find_entrance(&dest).unwrap().room_number, "101");
    }

    #[test]
    fn test_entrance_no_match() {
        let floor = sample_floor();
        let dest = Destination::new("L1", None, "Cafeteria");
        assert!(matches!(
            floor.find_entrance(&dest),
            Err(NavError::NoEntranceMatched { .. })
        ));
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "floors": [{
                "id": "L2",
                "scale": 2.0,
                "rotation_degrees": 90.0,
                "width": 200.0,
                "height": 100.0,
                "walls": [{"start": {"x": 0.0, "y": 0.0}, "end": {"x": 0.0, "y": 100.0}}],
                "entrances": [
                    {"room_number": "201", "name": "Lab", "position": {"x": 5.0, "y": 5.0}}
                ]
            }]
        }"#;
        let catalog = FloorCatalog::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);

        let floor = catalog.get(&FloorId::new("L2")).unwrap();
        assert_eq!(floor.metadata.scale, 2.0);
        assert_eq!(floor.walls.len(), 1);
        assert_eq!(floor.entrances[0].name, "Lab");
    }

    #[test]
    fn test_catalog_missing_floor() {
        let catalog = FloorCatalog::from_floors(vec![sample_floor()]);
        assert!(matches!(
            catalog.get(&FloorId::new("L9")),
            Err(NavError::MissingFloorData { .. })
        ));
    }
}
