//! Per-individual decision memory.
//!
//! Animals remember recent assimilation efficiency, the predation pressure
//! they went through and how much of each feeding class they ate. The
//! remembered experience shifts their innate preferences.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use weaver_types::{DryMass, Instar};

use crate::actors::PreyClass;
use crate::maxima::{MaximumKind, RunningMaxima};

/// Fixed-capacity buffer keeping the most recent values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RingBuffer {
    /// An empty buffer. A zero capacity is promoted to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a value, dropping the oldest one when full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean of the stored values; zero when empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Most recently pushed value.
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Drops every stored value.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maximum number of stored values.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Food eaten and assimilated during one time step, per feeding class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionRecord {
    per_class: BTreeMap<PreyClass, (f64, f64)>,
    eaten: f64,
    assimilated: f64,
}

impl IngestionRecord {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a meal.
    pub fn add(&mut self, class: PreyClass, eaten: DryMass, assimilated: DryMass) {
        let entry = self.per_class.entry(class).or_insert((0.0, 0.0));
        entry.0 += eaten.value();
        entry.1 += assimilated.value();
        self.eaten += eaten.value();
        self.assimilated += assimilated.value();
    }

    /// Total mass eaten.
    pub const fn total_eaten(&self) -> DryMass {
        DryMass::new(self.eaten)
    }

    /// Total mass assimilated.
    pub const fn total_assimilated(&self) -> DryMass {
        DryMass::new(self.assimilated)
    }

    /// Mass eaten of one class.
    pub fn eaten(&self, class: PreyClass) -> DryMass {
        DryMass::new(self.per_class.get(&class).map_or(0.0, |e| e.0))
    }

    /// Mass assimilated of one class.
    pub fn assimilated(&self, class: PreyClass) -> DryMass {
        DryMass::new(self.per_class.get(&class).map_or(0.0, |e| e.1))
    }

    /// Whether nothing was eaten.
    pub fn is_empty(&self) -> bool {
        self.per_class.is_empty()
    }

    /// Forgets every meal.
    pub fn clear(&mut self) {
        self.per_class.clear();
        self.eaten = 0.0;
        self.assimilated = 0.0;
    }
}

/// Largest patch assessments seen by one individual in its current instar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchMaxima {
    /// Largest patch edibility value.
    pub edibility: f64,
    /// Largest patch predation risk.
    pub predation_risk: f64,
    /// Largest patch conspecific biomass.
    pub conspecific_biomass: f64,
}

impl PatchMaxima {
    const fn slot_mut(&mut self, kind: MaximumKind) -> Option<&mut f64> {
        match kind {
            MaximumKind::PatchEdibility => Some(&mut self.edibility),
            MaximumKind::PatchPredationRisk => Some(&mut self.predation_risk),
            MaximumKind::PatchConspecificBiomass => Some(&mut self.conspecific_biomass),
            _ => None,
        }
    }

    /// Individual maximum of a patch statistic; zero for other kinds.
    pub const fn get(&self, kind: MaximumKind) -> f64 {
        match kind {
            MaximumKind::PatchEdibility => self.edibility,
            MaximumKind::PatchPredationRisk => self.predation_risk,
            MaximumKind::PatchConspecificBiomass => self.conspecific_biomass,
            _ => 0.0,
        }
    }

    /// Raises the individual maximum and propagates it to the species.
    pub fn observe(&mut self, kind: MaximumKind, value: f64, instar: Instar, species: &RunningMaxima) {
        let Some(slot) = self.slot_mut(kind) else {
            return;
        };
        *slot = slot.max(value);
        species.update(kind, instar, *slot);
    }

    /// `weight * individual + (1 - weight) * species`.
    pub fn blended(&self, kind: MaximumKind, instar: Instar, species: &RunningMaxima, weight: f64) -> f64 {
        weight * self.get(kind) + (1.0 - weight) * species.get(kind, instar)
    }
}

/// Learned preference for one feeding class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceEntry {
    /// The feeding class.
    pub class: PreyClass,
    /// Innate preference of the current instar.
    pub link_preference: f64,
    /// Current preference after experience.
    pub preference: f64,
    /// Recent share of the diet made of this class.
    pub experience: RingBuffer,
}

/// Decision memory of one animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionMemory {
    capacity: usize,
    assimilation_efficiency: RingBuffer,
    last_assimilation_efficiency: f64,
    cumulative_predation: RingBuffer,
    last_cumulative_predation: f64,
    max_cumulative_predation_current_step: f64,
    preferences: Vec<PreferenceEntry>,
    patch: PatchMaxima,
}

impl DecisionMemory {
    /// Buffer capacity for a memory depth in days.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn capacity_for(memory_depth_days: f64, time_steps_per_day: f64) -> usize {
        let steps = (memory_depth_days * time_steps_per_day).round();
        if steps.is_finite() && steps >= 1.0 {
            steps as usize
        } else {
            1
        }
    }

    /// Fresh memory whose preferences start at the innate link values.
    pub fn new(capacity: usize, links: impl IntoIterator<Item = (PreyClass, f64)>) -> Self {
        let preferences = links
            .into_iter()
            .map(|(class, link)| PreferenceEntry {
                class,
                link_preference: link,
                preference: link,
                experience: RingBuffer::new(capacity),
            })
            .collect();
        Self {
            capacity,
            assimilation_efficiency: RingBuffer::new(capacity),
            last_assimilation_efficiency: 0.0,
            cumulative_predation: RingBuffer::new(capacity),
            last_cumulative_predation: 0.0,
            max_cumulative_predation_current_step: 0.0,
            preferences,
            patch: PatchMaxima::default(),
        }
    }

    fn entry(&self, class: PreyClass) -> Option<&PreferenceEntry> {
        self.preferences.iter().find(|e| e.class == class)
    }

    /// Current preference for a feeding class; zero for unknown classes.
    pub fn preference(&self, class: PreyClass) -> f64 {
        self.entry(class).map_or(0.0, |e| e.preference)
    }

    /// Mean remembered diet share of a feeding class.
    pub fn mean_experience(&self, class: PreyClass) -> f64 {
        self.entry(class).map_or(0.0, |e| e.experience.mean())
    }

    /// Every preference entry.
    pub fn preferences(&self) -> &[PreferenceEntry] {
        &self.preferences
    }

    /// Closes a feeding step.
    ///
    /// Pushes the assimilation efficiency of the step, then each class's
    /// diet share, and recomputes preferences as
    /// `mean(experience) * influence + link * (1 - influence)`.
    pub fn set_last_ingestion(
        &mut self,
        record: &IngestionRecord,
        quality_resource_assessment: bool,
        experience_influence: f64,
    ) {
        let eaten = record.total_eaten().value();
        let assimilated = record.total_assimilated().value();
        self.last_assimilation_efficiency = if eaten > 0.0 { assimilated / eaten } else { 0.0 };
        self.assimilation_efficiency.push(self.last_assimilation_efficiency);

        for entry in &mut self.preferences {
            let experience = if eaten <= 0.0 {
                0.0
            } else if quality_resource_assessment {
                if assimilated > 0.0 {
                    record.assimilated(entry.class).value() / assimilated
                } else {
                    0.0
                }
            } else {
                record.eaten(entry.class).value() / eaten
            };
            entry.experience.push(experience);
            entry.preference = entry.experience.mean() * experience_influence
                + entry.link_preference * (1.0 - experience_influence);
        }
    }

    /// Switches to the innate links of a new instar.
    ///
    /// Classes that become edible or stop being edible lose their
    /// experience and restart at the new link value. Individual patch
    /// maxima are reset.
    pub fn change_instar(&mut self, links: impl IntoIterator<Item = (PreyClass, f64)>) {
        self.patch = PatchMaxima::default();
        for (class, link) in links {
            if let Some(entry) = self.preferences.iter_mut().find(|e| e.class == class) {
                let previous = entry.link_preference;
                let switched = (previous <= 0.0 || link <= 0.0) && (previous - link).abs() > 0.0;
                if switched {
                    entry.experience.clear();
                    entry.preference = link;
                }
                entry.link_preference = link;
            } else {
                self.preferences.push(PreferenceEntry {
                    class,
                    link_preference: link,
                    preference: link,
                    experience: RingBuffer::new(self.capacity),
                });
            }
        }
    }

    /// Whether the last assimilation efficiency is below the remembered mean.
    pub fn is_last_assimilation_lower_than_mean(&self) -> bool {
        self.last_assimilation_efficiency < self.assimilation_efficiency.mean()
    }

    /// Whether the last cumulative predation probability is above the remembered mean.
    pub fn is_last_cumulative_predation_upper_than_mean(&self) -> bool {
        self.cumulative_predation.last().unwrap_or(0.0) > self.cumulative_predation.mean()
    }

    /// Adds the predation probability of one encounter on the way to the
    /// current destination.
    pub fn add_predation_probability(&mut self, probability: f64) {
        self.last_cumulative_predation += probability;
    }

    /// Starts a new leg of movement.
    pub fn set_new_destination(&mut self) {
        self.max_cumulative_predation_current_step = self
            .max_cumulative_predation_current_step
            .max(self.last_cumulative_predation);
        self.last_cumulative_predation = 0.0;
    }

    /// Closes the time step's cumulative predation probability.
    pub fn close_cumulative_predation(&mut self) {
        self.cumulative_predation.push(
            self.max_cumulative_predation_current_step
                .max(self.last_cumulative_predation),
        );
        self.max_cumulative_predation_current_step = 0.0;
        self.last_cumulative_predation = 0.0;
    }

    /// Mean remembered cumulative predation probability.
    pub fn mean_cumulative_predation(&self) -> f64 {
        self.cumulative_predation.mean()
    }

    /// Mean remembered assimilation efficiency.
    pub fn mean_assimilation_efficiency(&self) -> f64 {
        self.assimilation_efficiency.mean()
    }

    /// Individual patch maxima.
    pub const fn patch_maxima(&self) -> &PatchMaxima {
        &self.patch
    }

    /// Mutable individual patch maxima.
    pub const fn patch_maxima_mut(&mut self) -> &mut PatchMaxima {
        &mut self.patch
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use weaver_types::{ResourceSpeciesId, SpeciesId};

    use super::*;

    fn grass() -> PreyClass {
        PreyClass::resource(ResourceSpeciesId(0))
    }

    fn beetle() -> PreyClass {
        PreyClass::animal(SpeciesId(1), Instar::new(2))
    }

    #[test]
    fn ring_buffer_keeps_the_most_recent_values() {
        let mut buffer = RingBuffer::new(3);
        assert!(buffer.mean().abs() < f64::EPSILON);
        for v in [1.0, 2.0, 3.0, 4.0] {
            buffer.push(v);
        }
        assert_eq!(buffer.len(), 3);
        assert!((buffer.mean() - 3.0).abs() < 1e-12);
        assert_eq!(buffer.last(), Some(4.0));
    }

    #[test]
    fn experience_shifts_preferences() {
        let mut memory = DecisionMemory::new(4, [(grass(), 0.5), (beetle(), 0.5)]);
        let mut record = IngestionRecord::new();
        record.add(grass(), DryMass::new(3.0), DryMass::new(1.5));
        record.add(beetle(), DryMass::new(1.0), DryMass::new(0.9));
        memory.set_last_ingestion(&record, false, 0.5);

        assert!((memory.mean_experience(grass()) - 0.75).abs() < 1e-12);
        assert!((memory.preference(grass()) - (0.75 * 0.5 + 0.5 * 0.5)).abs() < 1e-12);
        assert!((memory.preference(beetle()) - (0.25 * 0.5 + 0.5 * 0.5)).abs() < 1e-12);
        assert!((memory.mean_assimilation_efficiency() - 2.4 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn quality_assessment_uses_assimilated_shares() {
        let mut memory = DecisionMemory::new(4, [(grass(), 0.5), (beetle(), 0.5)]);
        let mut record = IngestionRecord::new();
        record.add(grass(), DryMass::new(3.0), DryMass::new(1.0));
        record.add(beetle(), DryMass::new(1.0), DryMass::new(1.0));
        memory.set_last_ingestion(&record, true, 1.0);
        assert!((memory.preference(beetle()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn instar_change_clears_switched_links_only() {
        let mut memory = DecisionMemory::new(4, [(grass(), 0.5), (beetle(), 0.0)]);
        let mut record = IngestionRecord::new();
        record.add(grass(), DryMass::new(1.0), DryMass::new(1.0));
        memory.set_last_ingestion(&record, false, 1.0);
        memory.patch_maxima_mut().edibility = 3.0;

        memory.change_instar([(grass(), 0.4), (beetle(), 0.6)]);
        assert!((memory.preference(beetle()) - 0.6).abs() < 1e-12);
        assert!(memory.mean_experience(beetle()).abs() < f64::EPSILON);
        assert!((memory.mean_experience(grass()) - 1.0).abs() < 1e-12);
        assert!(memory.patch_maxima().edibility.abs() < f64::EPSILON);
    }

    #[test]
    fn cumulative_predation_keeps_the_worst_leg() {
        let mut memory = DecisionMemory::new(4, Vec::new());
        memory.add_predation_probability(0.3);
        memory.add_predation_probability(0.2);
        memory.set_new_destination();
        memory.add_predation_probability(0.1);
        memory.close_cumulative_predation();
        assert!((memory.mean_cumulative_predation() - 0.5).abs() < 1e-12);

        memory.add_predation_probability(0.9);
        memory.close_cumulative_predation();
        assert!(memory.is_last_cumulative_predation_upper_than_mean());
    }

    #[test]
    fn patch_maxima_feed_the_species_maxima() {
        let species = RunningMaxima::new(2);
        let instar = Instar::FIRST;
        let mut patch = PatchMaxima::default();
        patch.observe(MaximumKind::PatchEdibility, 2.0, instar, &species);
        patch.observe(MaximumKind::PatchEdibility, 1.0, instar, &species);
        assert!((species.get(MaximumKind::PatchEdibility, instar) - 2.0).abs() < f64::EPSILON);
        species.update(MaximumKind::PatchEdibility, instar, 4.0);
        let blended = patch.blended(MaximumKind::PatchEdibility, instar, &species, 0.25);
        assert!((blended - (0.25 * 2.0 + 0.75 * 4.0)).abs() < 1e-12);
    }
}
