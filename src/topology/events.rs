use crate::path_network::graph::EdgeId;
use crate::path_network::waypoint::PointOnEdge;
use crate::topology::serializer::SubTopology;

/// One covered trail section, in the shape the trail API stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailEvent {
    pub trailsection: EdgeId,
    pub start_position: f64,
    pub end_position: f64,
    pub order: usize,
}

/// A waypoint as persisted with the trail, `order` starting at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub lat: f64,
    pub lng: f64,
    pub order: usize,
}

pub fn events_from_topology(serialized: &[SubTopology]) -> Vec<TrailEvent> {
    serialized
        .iter()
        .flat_map(|sub| {
            sub.paths
                .iter()
                .enumerate()
                .filter_map(|(idx, &trailsection)| {
                    sub.positions.get(&idx).map(|pos| (trailsection, *pos))
                })
        })
        .enumerate()
        .map(|(order, (trailsection, pos))| TrailEvent {
            trailsection,
            start_position: pos[0],
            end_position: pos[1],
            order,
        })
        .collect()
}

pub fn steps(waypoints: &[PointOnEdge]) -> Vec<Step> {
    waypoints
        .iter()
        .enumerate()
        .map(|(idx, waypoint)| {
            let picked = waypoint.original.unwrap_or(waypoint.coordinate);
            Step {
                lat: picked.y,
                lng: picked.x,
                order: idx + 1,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Coord;
    use std::collections::BTreeMap;

    #[test]
    fn test_events_number_sections_across_sub_topologies() {
        let serialized = vec![
            SubTopology {
                offset: 0.0,
                positions: BTreeMap::from([(0, [0.5, 1.0]), (1, [0.0, 0.3])]),
                paths: vec![4, 7],
            },
            SubTopology {
                offset: 0.0,
                positions: BTreeMap::from([(0, [0.3, 0.9])]),
                paths: vec![7],
            },
        ];

        let events = events_from_topology(&serialized);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            TrailEvent {
                trailsection: 7,
                start_position: 0.3,
                end_position: 0.9,
                order: 2,
            }
        );
        assert_eq!(events[0].order, 0);
        assert_eq!(events[1].trailsection, 7);
    }

    #[test]
    fn test_events_skip_sections_without_positions() {
        let serialized = vec![SubTopology {
            offset: 0.0,
            positions: BTreeMap::from([(1, [0.0, 1.0])]),
            paths: vec![1, 2],
        }];

        let events = events_from_topology(&serialized);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trailsection, 2);
        assert_eq!(events[0].order, 0);
    }

    #[test]
    fn test_steps_prefer_picked_coordinate() {
        let mut first = PointOnEdge::new(1, Coord { x: -72.5, y: 46.1 }, 0.1, 10.0);
        first.original = Some(Coord { x: -72.6, y: 46.2 });
        let second = PointOnEdge::new(2, Coord { x: -72.7, y: 46.3 }, 0.9, 10.0);

        let steps = steps(&[first, second]);
        assert_eq!(
            steps,
            vec![
                Step {
                    lat: 46.2,
                    lng: -72.6,
                    order: 1
                },
                Step {
                    lat: 46.3,
                    lng: -72.7,
                    order: 2
                },
            ]
        );
    }
}
