//! Scenes: named frame ranges with overlay text, and the activator that
//! tracks which one the current frame falls into.

use std::ops::RangeInclusive;

use log::debug;
use serde::Deserialize;

use crate::sequence::FrameIndex;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scene {
    pub id: u32,
    pub start: FrameIndex,
    pub end: FrameIndex,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    /// Small caption shown under the description.
    #[serde(default)]
    pub micro: Option<String>,
    /// Call-to-action label; present only on scenes that offer one.
    #[serde(default)]
    pub cta: Option<String>,
}

impl Scene {
    pub fn contains(&self, frame: FrameIndex) -> bool {
        (self.start..=self.end).contains(&frame)
    }

    pub fn has_cta(&self) -> bool {
        self.cta.is_some()
    }
}

/// Emitted when the active scene id changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneChange {
    pub previous: Option<u32>,
    pub current: Option<u32>,
}

pub struct SceneActivator {
    scenes: Vec<Scene>,
    active: Option<u32>,
}

impl SceneActivator {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            active: None,
        }
    }

    /// First scene containing `round(frame)`. Ranges may leave gaps.
    pub fn resolve(&self, frame: f64) -> Option<&Scene> {
        let rounded = frame.round();
        if rounded < 0.0 {
            return None;
        }
        let index = rounded as FrameIndex;
        self.scenes.iter().find(|s| s.contains(index))
    }

    /// Re-resolve for `frame`; returns a change only when the id differs from
    /// the previous one.
    pub fn update(&mut self, frame: f64) -> Option<SceneChange> {
        let current = self.resolve(frame).map(|s| s.id);
        if current == self.active {
            return None;
        }
        let change = SceneChange {
            previous: self.active,
            current,
        };
        debug!("scene: {:?} → {:?} at frame {frame:.2}", change.previous, current);
        self.active = current;
        Some(change)
    }

    pub fn active_id(&self) -> Option<u32> {
        self.active
    }

    pub fn active(&self) -> Option<&Scene> {
        let id = self.active?;
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }
}

fn scene(
    id: u32,
    range: RangeInclusive<FrameIndex>,
    [title, subtitle, description]: [&str; 3],
    micro: Option<&str>,
    cta: Option<&str>,
) -> Scene {
    Scene {
        id,
        start: *range.start(),
        end: *range.end(),
        title: title.into(),
        subtitle: subtitle.into(),
        description: description.into(),
        micro: micro.map(Into::into),
        cta: cta.map(Into::into),
    }
}

/// Built-in scene table for the default 192-frame sequence.
pub fn default_scenes() -> Vec<Scene> {
    vec![
        scene(
            1,
            1..=12,
            [
                "Dormant Rubab",
                "Dormant Intelligence",
                "Rubab begins in a neutral state: an AI human designed to observe, learn, and awaken only when purpose is defined.",
            ],
            Some("Initialization Phase"),
            None,
        ),
        scene(
            2,
            13..=35,
            [
                "Cognitive Core",
                "Cognitive Architecture",
                "Rubab's reasoning engine combines symbolic logic, data-driven learning, and ethical constraints into a single cognitive system.",
            ],
            Some("How Rubab Thinks"),
            None,
        ),
        scene(
            3,
            36..=54,
            [
                "Core Philosophy",
                "Core Model",
                "Rubab is not emotionless. Its core aligns purpose through three pillars: Education, Founder Mindset, and Room 19.",
            ],
            Some("Why Rubab Exists"),
            None,
        ),
        scene(
            4,
            55..=109,
            [
                "Ecosystem Network",
                "System Balance",
                "Each Rubab module is interconnected. Learning, emotional intelligence, and execution flow together to keep human growth balanced.",
            ],
            Some("Integrated Ecosystem"),
            None,
        ),
        scene(
            5,
            110..=136,
            [
                "Interface / Access Layer",
                "Knowledge Gateway",
                "Access research papers, frameworks, and system designs that power Rubab beneath the surface.",
            ],
            None,
            Some("Explore Research"),
        ),
        scene(
            6,
            143..=164,
            [
                "Upcoming Works",
                "Work in Progress",
                "Rubab is continuously evolving. New models, experiments, and integrations are actively under development.",
            ],
            Some("Future Systems"),
            None,
        ),
        scene(
            7,
            165..=184,
            [
                "Final Introduction",
                "Creator",
                "Built by Armaan (REALARMAAN): student, researcher, and system designer focused on AI-human alignment.",
            ],
            Some("About the Author"),
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse() -> SceneActivator {
        let mk = |id, start, end| scene(id, start..=end, ["t", "s", "d"], None, None);
        SceneActivator::new(vec![mk(1, 1, 12), mk(2, 13, 35), mk(5, 110, 136)])
    }

    #[test]
    fn resolves_containing_range() {
        let a = sparse();
        assert_eq!(a.resolve(20.0).map(|s| s.id), Some(2));
        assert_eq!(a.resolve(12.0).map(|s| s.id), Some(1));
        assert_eq!(a.resolve(13.0).map(|s| s.id), Some(2));
    }

    #[test]
    fn gaps_and_out_of_range_resolve_to_none() {
        let a = sparse();
        assert_eq!(a.resolve(137.0), None);
        assert_eq!(a.resolve(60.0), None);
        assert_eq!(a.resolve(0.0), None);
    }

    #[test]
    fn resolution_rounds_the_frame() {
        let a = sparse();
        assert_eq!(a.resolve(12.4).map(|s| s.id), Some(1));
        assert_eq!(a.resolve(12.5).map(|s| s.id), Some(2));
    }

    #[test]
    fn update_notifies_only_on_change() {
        let mut a = sparse();
        assert_eq!(
            a.update(1.0),
            Some(SceneChange { previous: None, current: Some(1) })
        );
        assert_eq!(a.update(5.0), None);
        assert_eq!(a.update(11.7), None);
        assert_eq!(
            a.update(14.0),
            Some(SceneChange { previous: Some(1), current: Some(2) })
        );
        assert_eq!(
            a.update(50.0),
            Some(SceneChange { previous: Some(2), current: None })
        );
        assert_eq!(a.update(60.0), None);
        assert_eq!(a.active_id(), None);
    }

    #[test]
    fn default_table_is_ordered_and_disjoint() {
        let scenes = default_scenes();
        assert_eq!(scenes.len(), 7);
        for pair in scenes.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        assert!(scenes.iter().all(|s| s.start <= s.end));
        assert_eq!(scenes.iter().filter(|s| s.has_cta()).count(), 1);
    }

    #[test]
    fn active_returns_full_scene() {
        let mut a = SceneActivator::new(default_scenes());
        a.update(120.0);
        let s = a.active().unwrap();
        assert_eq!(s.id, 5);
        assert_eq!(s.cta.as_deref(), Some("Explore Research"));
    }
}
