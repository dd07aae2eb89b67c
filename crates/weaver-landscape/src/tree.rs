//! Spatial tree of terrain cells.
//!
//! The [`SpatialTree`] is a quadtree stored in an arena: every
//! [`TerrainCell`] lives in one `Vec` and refers to its parent and children
//! by [`CellId`]. The root covers the whole map; each branch splits into
//! 2 x 2 children down to `map_depth` levels, and only leaves hold animals,
//! resources and a moisture source.
//!
//! Population counters are maintained incrementally along the parent chain
//! on every insert and removal, so empty subtrees can be skipped by radius
//! searches without a traversal.
//!
//! Radius searches guarantee coverage, not exactness: every cell whose area
//! intersects the disk is returned, and callers filter by exact distance.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use weaver_types::{
    Coverage, DryMass, LifeStage, Point, Rect, ResourceSpeciesId, TimeStep, WetMass,
};

use crate::config::LandscapeConfig;
use crate::error::LandscapeError;
use crate::moisture::{MoistureSource, MoistureState};
use crate::resource::{CellResource, ResourceSpecies};
use crate::search::{AnimalClass, AnimalSearchParams, ResourceSearchParams};

/// Offsets of the four children in units of the child size.
const QUADRANTS: [(f64, f64); 4] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];

/// Distance used to pull points on the far map edges back inside.
const EDGE_EPSILON: f64 = 1e-9;

/// Stable handle of a terrain cell in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(usize);

impl CellId {
    /// The root cell.
    pub const ROOT: Self = Self(0);

    /// Position in the arena.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A node of the spatial tree.
#[derive(Debug, Clone)]
pub struct TerrainCell<K> {
    id: CellId,
    parent: Option<CellId>,
    children: Option<[CellId; 4]>,
    depth: u32,
    area: Rect,
    /// Animals stored anywhere in the subtree.
    population: usize,
    animals: BTreeMap<AnimalClass, Vec<K>>,
    resources: Vec<CellResource>,
    moisture: usize,
}

impl<K> TerrainCell<K> {
    const fn new(id: CellId, parent: Option<CellId>, area: Rect, depth: u32) -> Self {
        Self {
            id,
            parent,
            children: None,
            depth,
            area,
            population: 0,
            animals: BTreeMap::new(),
            resources: Vec::new(),
            moisture: 0,
        }
    }

    /// Handle of the cell.
    pub const fn id(&self) -> CellId {
        self.id
    }

    /// Parent cell; `None` for the root.
    pub const fn parent(&self) -> Option<CellId> {
        self.parent
    }

    /// The four children of a branch.
    pub const fn children(&self) -> Option<[CellId; 4]> {
        self.children
    }

    /// Depth below the root (the root is depth 0).
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Region covered by the cell.
    pub const fn area(&self) -> Rect {
        self.area
    }

    /// Whether the cell has no children.
    pub const fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Number of animals stored in the subtree.
    pub const fn population(&self) -> usize {
        self.population
    }

    /// Animals of a leaf grouped by class.
    pub fn animals(&self) -> impl Iterator<Item = (AnimalClass, &[K])> {
        self.animals
            .iter()
            .map(|(class, keys)| (*class, keys.as_slice()))
    }

    /// Resources of a leaf.
    pub fn resources(&self) -> &[CellResource] {
        &self.resources
    }

    /// Resource of one species in a leaf.
    pub fn resource(&self, species: ResourceSpeciesId) -> Option<&CellResource> {
        self.resources
            .iter()
            .find(|resource| resource.species() == species)
    }

    /// Index of the moisture source covering a leaf.
    pub const fn moisture_source(&self) -> usize {
        self.moisture
    }
}

/// A cell returned by a radius search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellHit {
    /// The cell.
    pub cell: CellId,
    /// How the search disk covers it.
    pub coverage: Coverage,
}

/// An animal returned by a radius search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimalHit<K> {
    /// Caller's handle of the animal.
    pub key: K,
    /// Class the animal is stored under.
    pub class: AnimalClass,
    /// Leaf holding the animal.
    pub cell: CellId,
}

/// A resource returned by a radius search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceHit {
    /// Leaf holding the resource.
    pub cell: CellId,
    /// Resource species.
    pub species: ResourceSpeciesId,
    /// Share of the leaf inside the search disk.
    pub fraction: f64,
    /// Dry mass reachable from the search centre.
    pub available: DryMass,
}

/// Stored biomass of one resource in one leaf, for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceBiomass {
    /// Leaf holding the resource.
    pub cell: CellId,
    /// Resource species.
    pub species: ResourceSpeciesId,
    /// Wet biomass.
    pub biomass: WetMass,
}

/// Quadtree of terrain cells keyed by the caller's animal handle `K`.
#[derive(Debug, Clone)]
pub struct SpatialTree<K> {
    cells: Vec<TerrainCell<K>>,
    cells_per_axis: u32,
    min_cell_size: f64,
    map_depth: u32,
    cell_sizes: Vec<f64>,
    moisture: Vec<MoistureSource>,
    resource_species: Vec<ResourceSpecies>,
    total_active: usize,
    time_steps_per_day: f64,
}

impl<K: Copy + Eq> SpatialTree<K> {
    /// Build the tree, its moisture sources and its resource patches.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::InvalidConfig`] when the number of cells per axis is
    /// not a power of two, the cell size or time steps per day are not
    /// positive, or a moisture source or resource species is invalid.
    pub fn new(config: &LandscapeConfig, time_steps_per_day: f64) -> Result<Self, LandscapeError> {
        let cells_per_axis = config.number_of_cells_per_axis;
        if !cells_per_axis.is_power_of_two() {
            return Err(LandscapeError::InvalidConfig {
                reason: format!("number_of_cells_per_axis {cells_per_axis} is not a power of two"),
            });
        }
        if config.min_cell_size <= 0.0 || !config.min_cell_size.is_finite() {
            return Err(LandscapeError::InvalidConfig {
                reason: "min_cell_size must be positive".to_owned(),
            });
        }
        if time_steps_per_day <= 0.0 || !time_steps_per_day.is_finite() {
            return Err(LandscapeError::InvalidConfig {
                reason: "time_steps_per_day must be positive".to_owned(),
            });
        }

        let map_depth = cells_per_axis.trailing_zeros().saturating_add(1);
        let leaf_depth = map_depth.saturating_sub(1);
        let map_size = config.min_cell_size * f64::from(cells_per_axis);
        let cell_sizes: Vec<f64> = (0..map_depth)
            .map(|depth| map_size / f64::from(2_u32.saturating_pow(depth)))
            .collect();

        let mut cells = Vec::new();
        build_cell(
            &mut cells,
            None,
            Rect::square(Point::new(0.0, 0.0), map_size),
            0,
            leaf_depth,
        );

        let mut moisture = vec![MoistureSource::from_config(&config.base_moisture)?];
        for patch in &config.moisture_patches {
            moisture.push(MoistureSource::from_config(&patch.moisture)?);
        }

        let mut resource_species = Vec::with_capacity(config.resource_species.len());
        for (index, species_config) in config.resource_species.iter().enumerate() {
            let id = ResourceSpeciesId(u16::try_from(index).map_err(|_e| {
                LandscapeError::InvalidConfig {
                    reason: "too many resource species".to_owned(),
                }
            })?);
            resource_species.push(ResourceSpecies::from_config(id, species_config)?);
        }

        for cell in cells.iter_mut().filter(|cell| cell.is_leaf()) {
            let center = cell.area.center();
            let area = cell.area.width() * cell.area.height();
            cell.moisture = config
                .moisture_patches
                .iter()
                .rposition(|patch| patch.shape.contains(center))
                .map_or(0, |position| position.saturating_add(1));
            for species in &resource_species {
                let patch = config
                    .resource_species
                    .get(species.id.index())
                    .and_then(|c| c.patches.iter().rfind(|p| p.shape.contains(center)));
                if let Some(patch) = patch {
                    let capacity = patch.resource_maximum_capacity_density * area;
                    cell.resources.push(CellResource::new(
                        species.id,
                        WetMass::new(patch.initial_biomass_density * area),
                        WetMass::new(capacity),
                        WetMass::new(
                            capacity * (1.0 - patch.edible_fraction_of_max_carrying_capacity),
                        ),
                    ));
                }
            }
        }

        debug!(
            cells = cells.len(),
            map_depth,
            map_size,
            moisture_sources = moisture.len(),
            resource_species = resource_species.len(),
            "Spatial tree built"
        );

        Ok(Self {
            cells,
            cells_per_axis,
            min_cell_size: config.min_cell_size,
            map_depth,
            cell_sizes,
            moisture,
            resource_species,
            total_active: 0,
            time_steps_per_day,
        })
    }

    // -------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------

    /// Number of levels, root included: `log2(cells_per_axis) + 1`.
    pub const fn map_depth(&self) -> u32 {
        self.map_depth
    }

    /// Depth of the leaves.
    pub const fn leaf_depth(&self) -> u32 {
        self.map_depth.saturating_sub(1)
    }

    /// Leaf cells per side.
    pub const fn cells_per_axis(&self) -> u32 {
        self.cells_per_axis
    }

    /// Side length of a leaf.
    pub const fn min_cell_size(&self) -> f64 {
        self.min_cell_size
    }

    /// Side length of the cells at `depth`.
    pub fn cell_size(&self, depth: u32) -> Option<f64> {
        self.cell_sizes.get(usize::try_from(depth).ok()?).copied()
    }

    /// Region covered by the whole map.
    pub fn bounds(&self) -> Rect {
        self.cells
            .first()
            .map_or_else(Rect::default, |root| root.area)
    }

    /// Look a cell up by handle.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::UnknownCell`] for a handle from another tree.
    pub fn cell(&self, id: CellId) -> Result<&TerrainCell<K>, LandscapeError> {
        self.cells.get(id.0).ok_or(LandscapeError::UnknownCell(id))
    }

    fn cell_mut(&mut self, id: CellId) -> Result<&mut TerrainCell<K>, LandscapeError> {
        self.cells.get_mut(id.0).ok_or(LandscapeError::UnknownCell(id))
    }

    fn leaf_mut(&mut self, id: CellId) -> Result<&mut TerrainCell<K>, LandscapeError> {
        let cell = self.cell_mut(id)?;
        if cell.is_leaf() {
            Ok(cell)
        } else {
            Err(LandscapeError::NotALeaf(id))
        }
    }

    /// Every leaf, in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = &TerrainCell<K>> {
        self.cells.iter().filter(|cell| cell.is_leaf())
    }

    /// Whether `point` lies on the map, edges included.
    pub fn contains(&self, point: Point) -> bool {
        self.bounds().contains_inclusive(point)
    }

    /// Clamp `point` onto the map.
    pub fn clamp_to_map(&self, point: Point) -> Point {
        self.bounds().clamp_inside(point, EDGE_EPSILON)
    }

    /// The leaf containing `point`.
    ///
    /// Points on the far map edges belong to the last row or column.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::OutsideMap`] when `point` is off the map.
    pub fn leaf_at(&self, point: Point) -> Result<CellId, LandscapeError> {
        if !self.contains(point) {
            return Err(LandscapeError::OutsideMap {
                x: point.x,
                y: point.y,
            });
        }
        let point = self.clamp_to_map(point);
        let mut current = self.cell(CellId::ROOT)?;
        while let Some([south_west, south_east, north_west, north_east]) = current.children {
            let center = current.area.center();
            let quadrant = match (point.x >= center.x, point.y >= center.y) {
                (false, false) => south_west,
                (true, false) => south_east,
                (false, true) => north_west,
                (true, true) => north_east,
            };
            current = self.cell(quadrant)?;
        }
        Ok(current.id)
    }

    /// Uniform random point on the map.
    pub fn random_point(&self, rng: &mut impl Rng) -> Point {
        random_point_in(self.bounds(), rng)
    }

    /// Uniform random point inside a cell.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::UnknownCell`] for a foreign handle.
    pub fn random_point_in(&self, id: CellId, rng: &mut impl Rng) -> Result<Point, LandscapeError> {
        Ok(random_point_in(self.cell(id)?.area, rng))
    }

    // -------------------------------------------------------------------
    // Animals
    // -------------------------------------------------------------------

    /// Total animals stored in the tree.
    pub fn population(&self) -> usize {
        self.cells.first().map_or(0, |root| root.population)
    }

    /// Animals stored in the tree whose class is [`LifeStage::Active`].
    pub const fn total_active(&self) -> usize {
        self.total_active
    }

    /// Store an animal in the leaf containing `point`.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::OutsideMap`] when `point` is off the map.
    pub fn insert_animal(
        &mut self,
        key: K,
        class: AnimalClass,
        point: Point,
    ) -> Result<CellId, LandscapeError> {
        let leaf = self.leaf_at(point)?;
        self.insert_into(leaf, key, class)?;
        Ok(leaf)
    }

    fn insert_into(&mut self, leaf: CellId, key: K, class: AnimalClass) -> Result<(), LandscapeError> {
        self.leaf_mut(leaf)?
            .animals
            .entry(class)
            .or_default()
            .push(key);
        self.adjust_population(leaf, true)?;
        if class.life_stage == LifeStage::Active {
            self.total_active = self.total_active.saturating_add(1);
        }
        Ok(())
    }

    /// Remove an animal from its leaf.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::AnimalNotInCell`] when the leaf does not hold `key`
    /// under `class`.
    pub fn remove_animal(
        &mut self,
        leaf: CellId,
        key: K,
        class: AnimalClass,
    ) -> Result<(), LandscapeError> {
        let cell = self.leaf_mut(leaf)?;
        let keys = cell
            .animals
            .get_mut(&class)
            .ok_or(LandscapeError::AnimalNotInCell(leaf))?;
        let position = keys
            .iter()
            .position(|stored| *stored == key)
            .ok_or(LandscapeError::AnimalNotInCell(leaf))?;
        keys.swap_remove(position);
        if keys.is_empty() {
            cell.animals.remove(&class);
        }
        self.adjust_population(leaf, false)?;
        if class.life_stage == LifeStage::Active {
            self.total_active = self.total_active.saturating_sub(1);
        }
        Ok(())
    }

    /// Remove every copy of `key` from the tree, whatever its leaf or class.
    ///
    /// Returns how many entries were dropped.
    pub fn evict_animal(&mut self, key: K) -> usize {
        let mut stale = Vec::new();
        for leaf in self.leaves() {
            for (class, keys) in &leaf.animals {
                if keys.contains(&key) {
                    stale.push((leaf.id, *class));
                }
            }
        }
        stale
            .into_iter()
            .filter(|(leaf, class)| self.remove_animal(*leaf, key, *class).is_ok())
            .count()
    }

    /// Move an animal to the leaf containing `to`.
    ///
    /// Returns the new leaf. Moving inside the same leaf touches nothing.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::OutsideMap`] or [`LandscapeError::AnimalNotInCell`].
    pub fn move_animal(
        &mut self,
        from: CellId,
        key: K,
        class: AnimalClass,
        to: Point,
    ) -> Result<CellId, LandscapeError> {
        let target = self.leaf_at(to)?;
        if target != from {
            self.remove_animal(from, key, class)?;
            self.insert_into(target, key, class)?;
        }
        Ok(target)
    }

    /// Re-bucket an animal whose class changed (moult, life stage).
    ///
    /// # Errors
    ///
    /// [`LandscapeError::AnimalNotInCell`] when `old` does not match.
    pub fn reclassify(
        &mut self,
        leaf: CellId,
        key: K,
        old: AnimalClass,
        new: AnimalClass,
    ) -> Result<(), LandscapeError> {
        if old != new {
            self.remove_animal(leaf, key, old)?;
            self.insert_into(leaf, key, new)?;
        }
        Ok(())
    }

    fn adjust_population(&mut self, leaf: CellId, increment: bool) -> Result<(), LandscapeError> {
        let mut next = Some(leaf);
        while let Some(id) = next {
            let cell = self.cell_mut(id)?;
            cell.population = if increment {
                cell.population.saturating_add(1)
            } else {
                cell.population.saturating_sub(1)
            };
            next = cell.parent;
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Radius searches
    // -------------------------------------------------------------------

    /// Cells intersecting the disk of `radius` around `center`.
    ///
    /// The descent stops at `search_depth` (clamped to the leaf depth), so a
    /// shallow search returns fewer, larger cells. Children of a fully
    /// covered cell inherit full coverage without a geometric test.
    pub fn cells_on_radius(&self, center: Point, radius: f64, search_depth: u32) -> Vec<CellHit> {
        let mut hits = Vec::new();
        let depth = search_depth.min(self.leaf_depth());
        self.collect_cells(CellId::ROOT, center, radius, depth, false, &mut hits);
        hits
    }

    fn collect_cells(
        &self,
        id: CellId,
        center: Point,
        radius: f64,
        search_depth: u32,
        inherited_full: bool,
        hits: &mut Vec<CellHit>,
    ) {
        let Some(cell) = self.cells.get(id.0) else {
            return;
        };
        let coverage = if inherited_full {
            Coverage::Full
        } else {
            cell.area.disk_coverage(center, radius)
        };
        if coverage == Coverage::Null {
            return;
        }
        match cell.children {
            Some(children) if cell.depth < search_depth => {
                for child in children {
                    self.collect_cells(
                        child,
                        center,
                        radius,
                        search_depth,
                        coverage == Coverage::Full,
                        hits,
                    );
                }
            }
            _ => hits.push(CellHit { cell: id, coverage }),
        }
    }

    /// Visit every leaf under `id` that intersects the disk.
    ///
    /// Subtrees with no animals are skipped when `occupied_only` is set.
    fn visit_leaves<F>(
        &self,
        id: CellId,
        center: Point,
        radius: f64,
        inherited: Coverage,
        occupied_only: bool,
        visit: &mut F,
    ) where
        F: FnMut(&TerrainCell<K>, Coverage),
    {
        let Some(cell) = self.cells.get(id.0) else {
            return;
        };
        if occupied_only && cell.population == 0 {
            return;
        }
        let coverage = if inherited == Coverage::Full {
            Coverage::Full
        } else {
            cell.area.disk_coverage(center, radius)
        };
        if coverage == Coverage::Null {
            return;
        }
        match cell.children {
            Some(children) => {
                for child in children {
                    self.visit_leaves(child, center, radius, coverage, occupied_only, visit);
                }
            }
            None => visit(cell, coverage),
        }
    }

    /// Candidate animals within `radius` of `center` accepted by `params`.
    ///
    /// Returns every matching animal stored in a leaf that intersects the
    /// disk; exact distances are left to the caller.
    pub fn animals_on_radius(
        &self,
        center: Point,
        radius: f64,
        search_depth: u32,
        params: &AnimalSearchParams,
    ) -> Vec<AnimalHit<K>> {
        let mut found = Vec::new();
        if params.is_empty() {
            return found;
        }
        for hit in self.cells_on_radius(center, radius, search_depth) {
            self.visit_leaves(
                hit.cell,
                center,
                radius,
                hit.coverage,
                true,
                &mut |leaf, _| collect_animals(leaf, params, &mut found),
            );
        }
        found
    }

    /// Animals accepted by `params` stored anywhere under `id`.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::UnknownCell`] for a foreign handle.
    pub fn animals_in(
        &self,
        id: CellId,
        params: &AnimalSearchParams,
    ) -> Result<Vec<AnimalHit<K>>, LandscapeError> {
        let area = self.cell(id)?.area;
        let mut found = Vec::new();
        self.visit_leaves(
            id,
            area.center(),
            0.0,
            Coverage::Full,
            true,
            &mut |leaf, _| collect_animals(leaf, params, &mut found),
        );
        Ok(found)
    }

    /// Edible resources within `radius` of `center` accepted by `params`.
    ///
    /// Partially covered leaves offer the share of their biomass that lies
    /// inside the disk.
    pub fn resources_on_radius(
        &self,
        center: Point,
        radius: f64,
        search_depth: u32,
        params: &ResourceSearchParams,
    ) -> Vec<ResourceHit> {
        let mut found = Vec::new();
        if params.is_empty() {
            return found;
        }
        for hit in self.cells_on_radius(center, radius, search_depth) {
            self.visit_leaves(
                hit.cell,
                center,
                radius,
                hit.coverage,
                false,
                &mut |leaf, coverage| {
                    let fraction = match coverage {
                        Coverage::Full => 1.0,
                        Coverage::Partial => disk_fraction(leaf.area, center, radius),
                        Coverage::Null => 0.0,
                    };
                    self.collect_resources(leaf, params, fraction, &mut found);
                },
            );
        }
        found
    }

    /// Edible resources accepted by `params` anywhere under `id`.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::UnknownCell`] for a foreign handle.
    pub fn resources_in(
        &self,
        id: CellId,
        params: &ResourceSearchParams,
    ) -> Result<Vec<ResourceHit>, LandscapeError> {
        let area = self.cell(id)?.area;
        let mut found = Vec::new();
        self.visit_leaves(
            id,
            area.center(),
            0.0,
            Coverage::Full,
            false,
            &mut |leaf, _| self.collect_resources(leaf, params, 1.0, &mut found),
        );
        Ok(found)
    }

    fn collect_resources(
        &self,
        leaf: &TerrainCell<K>,
        params: &ResourceSearchParams,
        fraction: f64,
        found: &mut Vec<ResourceHit>,
    ) {
        for resource in &leaf.resources {
            if !params.accepts(resource.species()) {
                continue;
            }
            let Some(species) = self.resource_species.get(resource.species().index()) else {
                continue;
            };
            let available = resource.available_dry_mass(species.conversion_to_wet_mass, fraction);
            if available.value() > 0.0 {
                found.push(ResourceHit {
                    cell: leaf.id,
                    species: resource.species(),
                    fraction,
                    available,
                });
            }
        }
    }

    // -------------------------------------------------------------------
    // Resources and moisture
    // -------------------------------------------------------------------

    /// Resource species registered in the landscape.
    pub fn resource_species(&self) -> &[ResourceSpecies] {
        &self.resource_species
    }

    /// Remove up to `dry` of a resource from a leaf.
    ///
    /// Returns the dry mass actually removed.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::ResourceNotInCell`] when the leaf holds no such resource.
    pub fn subtract_resource(
        &mut self,
        leaf: CellId,
        species: ResourceSpeciesId,
        dry: DryMass,
    ) -> Result<DryMass, LandscapeError> {
        let conversion = self
            .resource_species
            .get(species.index())
            .map(|s| s.conversion_to_wet_mass)
            .ok_or(LandscapeError::ResourceNotInCell { cell: leaf, species })?;
        let resource = self
            .leaf_mut(leaf)?
            .resources
            .iter_mut()
            .find(|resource| resource.species() == species)
            .ok_or(LandscapeError::ResourceNotInCell { cell: leaf, species })?;
        Ok(resource.subtract(dry, conversion))
    }

    /// Moisture conditions of the leaf `id`.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::UnknownCell`] for a foreign handle.
    pub fn moisture_at(&self, id: CellId) -> Result<MoistureState, LandscapeError> {
        Ok(self.moisture_source_of(id)?.current())
    }

    /// Whether predators are excluded from the leaf `id`.
    pub fn is_enemy_free(&self, id: CellId) -> bool {
        self.moisture_source_of(id)
            .is_ok_and(MoistureSource::is_enemy_free)
    }

    /// Whether conspecifics are ignored in the leaf `id`.
    pub fn is_competitor_free(&self, id: CellId) -> bool {
        self.moisture_source_of(id)
            .is_ok_and(MoistureSource::is_competitor_free)
    }

    fn moisture_source_of(&self, id: CellId) -> Result<&MoistureSource, LandscapeError> {
        let source = self.cell(id)?.moisture;
        self.moisture
            .get(source)
            .ok_or(LandscapeError::UnknownCell(id))
    }

    /// Advance moisture to `time_step` and grow every resource one step.
    ///
    /// Returns the total change in wet biomass.
    pub fn update(&mut self, time_step: TimeStep) -> f64 {
        for source in &mut self.moisture {
            source.update(time_step, self.time_steps_per_day);
        }
        let mut change = 0.0;
        for cell in self.cells.iter_mut().filter(|cell| cell.is_leaf()) {
            let Some(relative_humidity) = self
                .moisture
                .get(cell.moisture)
                .map(|source| source.current().relative_humidity)
            else {
                continue;
            };
            for resource in &mut cell.resources {
                if let Some(species) = self.resource_species.get(resource.species().index()) {
                    change += resource.grow(species, relative_humidity, self.time_steps_per_day);
                }
            }
        }
        debug!(
            time_step = time_step.value(),
            biomass_change = change,
            "Landscape updated"
        );
        change
    }

    /// Biomass of every resource in every leaf.
    pub fn resource_biomass(&self) -> Vec<ResourceBiomass> {
        self.leaves()
            .flat_map(|leaf| {
                leaf.resources.iter().map(|resource| ResourceBiomass {
                    cell: leaf.id,
                    species: resource.species(),
                    biomass: resource.biomass(),
                })
            })
            .collect()
    }

    /// Overwrite resource biomass from a snapshot.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::ResourceNotInCell`] when an entry names a resource
    /// the leaf does not hold.
    pub fn restore_resource_biomass(
        &mut self,
        entries: &[ResourceBiomass],
    ) -> Result<(), LandscapeError> {
        for entry in entries {
            let resource = self
                .leaf_mut(entry.cell)?
                .resources
                .iter_mut()
                .find(|resource| resource.species() == entry.species)
                .ok_or(LandscapeError::ResourceNotInCell {
                    cell: entry.cell,
                    species: entry.species,
                })?;
            resource.set_biomass(entry.biomass);
        }
        Ok(())
    }
}

/// Push a cell and, below the leaf depth, its four children.
fn build_cell<K>(
    cells: &mut Vec<TerrainCell<K>>,
    parent: Option<CellId>,
    area: Rect,
    depth: u32,
    leaf_depth: u32,
) -> CellId {
    let id = CellId(cells.len());
    cells.push(TerrainCell::new(id, parent, area, depth));
    if depth < leaf_depth {
        let half = area.width() * 0.5;
        let mut children = [id; 4];
        for (child, (dx, dy)) in children.iter_mut().zip(QUADRANTS) {
            let min = Point::new(area.min.x + dx * half, area.min.y + dy * half);
            *child = build_cell(
                cells,
                Some(id),
                Rect::square(min, half),
                depth.saturating_add(1),
                leaf_depth,
            );
        }
        if let Some(cell) = cells.get_mut(id.0) {
            cell.children = Some(children);
        }
    }
    id
}

fn collect_animals<K: Copy>(
    leaf: &TerrainCell<K>,
    params: &AnimalSearchParams,
    found: &mut Vec<AnimalHit<K>>,
) {
    for (class, keys) in &leaf.animals {
        if params.accepts(*class) {
            found.extend(keys.iter().map(|key| AnimalHit {
                key: *key,
                class: *class,
                cell: leaf.id,
            }));
        }
    }
}

fn random_point_in(area: Rect, rng: &mut impl Rng) -> Point {
    let x = area.min.x + rng.random::<f64>() * area.width();
    let y = area.min.y + rng.random::<f64>() * area.height();
    area.clamp_inside(Point::new(x, y), EDGE_EPSILON)
}

/// Share of `area` inside the disk, from the exact overlap area.
fn disk_fraction(area: Rect, center: Point, radius: f64) -> f64 {
    let cell_area = area.width() * area.height();
    if radius <= 0.0 || cell_area <= 0.0 {
        return 0.0;
    }
    let overlap = disk_rect_overlap(
        area.min.x - center.x,
        area.max.x - center.x,
        area.min.y - center.y,
        area.max.y - center.y,
        radius,
    );
    (overlap / cell_area).clamp(0.0, 1.0)
}

/// Area of the disk of radius `r` at the origin inside `[x0, x1] x [y0, y1]`.
fn disk_rect_overlap(x0: f64, x1: f64, y0: f64, y1: f64, r: f64) -> f64 {
    if y1 <= 0.0 {
        // Entirely below the x axis: mirror it above.
        return disk_rect_overlap(x0, x1, -y1, -y0, r);
    }
    if y0 < 0.0 {
        return disk_rect_overlap(x0, x1, 0.0, -y0, r) + disk_rect_overlap(x0, x1, 0.0, y1, r);
    }
    disk_above(x0, x1, y0, r) - disk_above(x0, x1, y1, r)
}

/// Area of the disk between `x0` and `x1` above the line `y = h`, `h >= 0`.
fn disk_above(x0: f64, x1: f64, h: f64, r: f64) -> f64 {
    if h >= r {
        return 0.0;
    }
    let half_chord = (r * r - h * h).sqrt();
    let from = x0.clamp(-half_chord, half_chord);
    let to = x1.clamp(-half_chord, half_chord);
    chord_primitive(to, h, r) - chord_primitive(from, h, r)
}

/// Primitive of `sqrt(r² - x²) - h` over `x`.
fn chord_primitive(x: f64, h: f64, r: f64) -> f64 {
    let ratio = (x / r).clamp(-1.0, 1.0);
    0.5 * (x * (r * r - x * x).max(0.0).sqrt() + r * r * ratio.asin()) - h * x
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use weaver_types::{Gender, Instar, SpeciesId};

    use super::*;
    use crate::config::{
        MoistureConfig, MoisturePatchConfig, PatchShape, ResourcePatchConfig,
        ResourceSpeciesConfig,
    };

    fn config() -> LandscapeConfig {
        LandscapeConfig {
            number_of_cells_per_axis: 8,
            min_cell_size: 1.0,
            base_moisture: MoistureConfig::default(),
            moisture_patches: vec![MoisturePatchConfig {
                shape: PatchShape::Rectangle {
                    min_x: 0.0,
                    min_y: 0.0,
                    max_x: 2.0,
                    max_y: 2.0,
                },
                moisture: MoistureConfig {
                    relative_humidity_cycle: vec![10.0],
                    in_enemy_free_space: true,
                    ..MoistureConfig::default()
                },
            }],
            resource_species: vec![ResourceSpeciesConfig {
                name: "Mould".to_owned(),
                conversion_to_wet_mass: 2.0,
                rate_of_increase: 1.0,
                min_relative_humidity: 50.0,
                max_relative_humidity: 100.0,
                patches: vec![ResourcePatchConfig {
                    shape: PatchShape::Homogeneous,
                    initial_biomass_density: 2.0,
                    resource_maximum_capacity_density: 10.0,
                    edible_fraction_of_max_carrying_capacity: 0.9,
                }],
            }],
        }
    }

    fn tree() -> SpatialTree<u32> {
        SpatialTree::new(&config(), 1.0).unwrap()
    }

    fn class(species: u16, instar: u16) -> AnimalClass {
        AnimalClass {
            life_stage: LifeStage::Active,
            species: SpeciesId(species),
            instar: Instar::new(instar),
            gender: Gender::Female,
        }
    }

    fn everything() -> AnimalSearchParams {
        let mut params = AnimalSearchParams::new();
        for species in 0..3 {
            for instar in 1..=4 {
                params.add_all_genders(LifeStage::Active, SpeciesId(species), Instar::new(instar));
            }
        }
        params
    }

    #[test]
    fn depth_and_cell_sizes() {
        let tree = tree();
        assert_eq!(tree.map_depth(), 4);
        assert_eq!(tree.leaf_depth(), 3);
        assert!((tree.cell_size(0).unwrap() - 8.0).abs() < f64::EPSILON);
        assert!((tree.cell_size(3).unwrap() - 1.0).abs() < f64::EPSILON);
        assert!(tree.cell_size(4).is_none());
        assert_eq!(tree.leaves().count(), 64);
        assert!(tree.leaves().all(|leaf| leaf.depth() == 3));
    }

    #[test]
    fn rejects_non_power_of_two() {
        let config = LandscapeConfig {
            number_of_cells_per_axis: 6,
            ..config()
        };
        assert!(matches!(
            SpatialTree::<u32>::new(&config, 1.0),
            Err(LandscapeError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn leaf_lookup_by_point() {
        let tree = tree();
        let leaf = tree.leaf_at(Point::new(2.5, 5.5)).unwrap();
        let area = tree.cell(leaf).unwrap().area();
        assert!((area.min.x - 2.0).abs() < f64::EPSILON);
        assert!((area.min.y - 5.0).abs() < f64::EPSILON);
        let corner = tree.leaf_at(Point::new(8.0, 8.0)).unwrap();
        assert!(tree.cell(corner).unwrap().area().contains(Point::new(7.5, 7.5)));
        assert!(matches!(
            tree.leaf_at(Point::new(-0.1, 1.0)),
            Err(LandscapeError::OutsideMap { .. })
        ));
    }

    #[test]
    fn population_counters_follow_inserts_moves_and_removals() {
        let mut tree = tree();
        let first = tree.insert_animal(1, class(0, 1), Point::new(0.5, 0.5)).unwrap();
        tree.insert_animal(2, class(0, 1), Point::new(7.5, 7.5)).unwrap();
        assert_eq!(tree.population(), 2);
        assert_eq!(tree.total_active(), 2);
        let parent = tree.cell(first).unwrap().parent().unwrap();
        assert_eq!(tree.cell(parent).unwrap().population(), 1);

        let moved = tree
            .move_animal(first, 1, class(0, 1), Point::new(6.5, 6.5))
            .unwrap();
        assert_ne!(moved, first);
        assert_eq!(tree.cell(first).unwrap().population(), 0);
        assert_eq!(tree.cell(moved).unwrap().population(), 1);
        assert_eq!(tree.population(), 2);

        let pupa = AnimalClass {
            life_stage: LifeStage::Pupa,
            ..class(0, 1)
        };
        tree.reclassify(moved, 1, class(0, 1), pupa).unwrap();
        assert_eq!(tree.total_active(), 1);
        assert!(matches!(
            tree.remove_animal(moved, 1, class(0, 1)),
            Err(LandscapeError::AnimalNotInCell(_))
        ));
        tree.remove_animal(moved, 1, pupa).unwrap();
        assert_eq!(tree.population(), 1);
    }

    #[test]
    fn eviction_drops_a_key_under_any_class() {
        let mut tree = tree();
        tree.insert_animal(1, class(0, 1), Point::new(0.5, 0.5)).unwrap();
        tree.insert_animal(1, class(1, 2), Point::new(5.5, 5.5)).unwrap();
        tree.insert_animal(2, class(0, 1), Point::new(0.5, 0.5)).unwrap();
        assert_eq!(tree.evict_animal(1), 2);
        assert_eq!(tree.population(), 1);
        assert_eq!(tree.total_active(), 1);
        assert_eq!(tree.evict_animal(1), 0);
    }

    #[test]
    fn radius_search_covers_every_intersecting_leaf() {
        let tree = tree();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..200 {
            let center = tree.random_point(&mut rng);
            let radius = rng.random_range(0.0..4.0);
            let depth = rng.random_range(0..=3);
            let hits = tree.cells_on_radius(center, radius, depth);
            for leaf in tree.leaves() {
                if leaf.area().distance_to_point(center) > radius {
                    continue;
                }
                // Some returned cell must be the leaf or one of its ancestors.
                let mut ancestor = Some(leaf.id());
                let mut covered = false;
                while let Some(id) = ancestor {
                    if hits.iter().any(|hit| hit.cell == id) {
                        covered = true;
                        break;
                    }
                    ancestor = tree.cell(id).unwrap().parent();
                }
                assert!(covered, "leaf {:?} missed for {center:?} r={radius}", leaf.id());
            }
        }
    }

    #[test]
    fn animal_search_filters_and_skips_far_animals() {
        let mut tree = tree();
        tree.insert_animal(1, class(0, 3), Point::new(0.5, 0.5)).unwrap();
        tree.insert_animal(2, class(0, 1), Point::new(1.5, 0.5)).unwrap();
        tree.insert_animal(3, class(1, 1), Point::new(1.6, 0.6)).unwrap();
        tree.insert_animal(4, class(0, 1), Point::new(7.5, 7.5)).unwrap();

        let mut prey = AnimalSearchParams::new();
        prey.add_all_genders(LifeStage::Active, SpeciesId(0), Instar::FIRST);
        let hits = tree.animals_on_radius(Point::new(0.5, 0.5), 2.0, tree.leaf_depth(), &prey);
        let keys: Vec<u32> = hits.iter().map(|hit| hit.key).collect();
        assert_eq!(keys, vec![2]);

        let all = tree.animals_on_radius(Point::new(0.5, 0.5), 2.0, 1, &everything());
        assert_eq!(all.len(), 3);
        let whole_map = tree.animals_in(CellId::ROOT, &everything()).unwrap();
        assert_eq!(whole_map.len(), 4);
    }

    #[test]
    fn resources_grow_by_humidity_and_are_eaten_above_the_floor() {
        let mut tree = tree();
        let mut params = ResourceSearchParams::new();
        params.add(ResourceSpeciesId(0));

        let dry = tree.leaf_at(Point::new(0.5, 0.5)).unwrap();
        let wet = tree.leaf_at(Point::new(5.5, 5.5)).unwrap();
        assert!(tree.is_enemy_free(dry));
        assert!(!tree.is_enemy_free(wet));

        tree.update(TimeStep::new(1));
        let biomass = |tree: &SpatialTree<u32>, id| {
            tree.cell(id)
                .unwrap()
                .resource(ResourceSpeciesId(0))
                .unwrap()
                .biomass()
                .value()
        };
        // 2 + 1 * 2 * (1 - 2/10)
        assert!((biomass(&tree, wet) - 3.6).abs() < 1e-12);
        assert!((biomass(&tree, dry) - 2.0).abs() < 1e-12);

        let hits = tree.resources_in(wet, &params).unwrap();
        let hit = hits.first().unwrap();
        // (3.6 - 1.0) wet / 2
        assert!((hit.available.value() - 1.3).abs() < 1e-12);
        let eaten = tree
            .subtract_resource(wet, ResourceSpeciesId(0), DryMass::new(10.0))
            .unwrap();
        assert!((eaten.value() - 1.3).abs() < 1e-12);
        assert!(tree.resources_in(wet, &params).unwrap().is_empty());

        let around = tree.resources_on_radius(Point::new(4.0, 4.0), 1.0, 3, &params);
        assert!(!around.is_empty());
        assert!(around.iter().all(|hit| hit.fraction > 0.0 && hit.fraction < 1.0));

        let saved = tree.resource_biomass();
        let mut restored = SpatialTree::<u32>::new(&config(), 1.0).unwrap();
        restored.restore_resource_biomass(&saved).unwrap();
        assert!((biomass(&restored, wet) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tiny_disk_still_sees_the_resource_beneath_it() {
        let tree = tree();
        let mut params = ResourceSearchParams::new();
        params.add(ResourceSpeciesId(0));
        let leaf = tree.leaf_at(Point::new(3.5, 3.5)).unwrap();
        let whole = tree.resources_in(leaf, &params).unwrap();
        let whole = whole.first().unwrap().available.value();

        let hits = tree.resources_on_radius(Point::new(3.5, 3.5), 0.05, 3, &params);

        let hit = hits.iter().find(|hit| hit.cell == leaf).unwrap();
        let disk = std::f64::consts::PI * 0.05 * 0.05;
        assert!((hit.fraction - disk).abs() < 1e-12);
        assert!(hit.available.value() > 0.0);
        assert!(hit.available.value() < whole);
    }

    #[test]
    fn overlap_matches_known_areas() {
        let unit = Rect::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        // A disk centred on a corner covers a quarter of itself.
        let quarter = disk_fraction(unit, Point::new(0.0, 0.0), 0.5);
        assert!((quarter - std::f64::consts::PI * 0.25 / 4.0).abs() < 1e-12);
        // Centred on an edge midpoint: half the disk.
        let half = disk_fraction(unit, Point::new(0.5, 0.0), 0.25);
        assert!((half - std::f64::consts::PI * 0.0625 / 2.0).abs() < 1e-12);
        // Large enough to swallow the cell.
        assert!((disk_fraction(unit, Point::new(0.5, 0.5), 2.0) - 1.0).abs() < 1e-12);
        assert!(disk_fraction(unit, Point::new(3.0, 3.0), 1.0).abs() < 1e-12);
    }
}
