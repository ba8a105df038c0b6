//! The scene: owner of every curve and surface the GUI works on.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use nurbs_core::traits::{BoundingBox, Versioned};
use nurbs_core::{Generation, KernelConfig, KernelError, Result};
use nurbs_geometry::{
    ControlGrid, ControlPoint, Direction, KnotScheme, NurbsCurve, NurbsSurface,
};
use nurbs_math::{Aabb3, Point3, Vector3};
use nurbs_mesh::{
    tessellate_curve, tessellate_surface, Polyline, Sampling, SurfaceSampling, TessellationCache,
    TriangleMesh,
};
use rayon::prelude::*;
use slotmap::SlotMap;

use crate::handle::{CurveHandle, SurfaceHandle};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Entry<G, T> {
    geometry: G,
    cache: Mutex<TessellationCache<T>>,
}

impl<G, T> Entry<G, T> {
    fn new(geometry: G) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self {
            geometry,
            cache: Mutex::new(TessellationCache::new()),
        }))
    }
}

impl<G: Versioned, T> Entry<G, T> {
    fn tessellate<F>(&self, build: F) -> Result<Arc<T>>
    where
        F: FnOnce(&G) -> Result<T>,
    {
        lock(&self.cache).get_or_try_insert_with(self.geometry.generation(), || build(&self.geometry))
    }
}

type Objects<K, G, T> = RwLock<SlotMap<K, Arc<RwLock<Entry<G, T>>>>>;

/// Tessellations of every object in the scene, keyed by handle.
#[derive(Debug, Default)]
pub struct SceneTessellation {
    pub curves: Vec<(CurveHandle, Result<Arc<Polyline>>)>,
    pub surfaces: Vec<(SurfaceHandle, Result<Arc<TriangleMesh>>)>,
}

/// Owns curves and surfaces and hands out cached tessellations.
///
/// Each object lives behind its own lock: edits on one object never block
/// evaluation of another, and worker threads may tessellate while the GUI
/// thread edits.
pub struct Scene {
    config: KernelConfig,
    sampling: Sampling,
    surface_sampling: SurfaceSampling,
    curves: Objects<CurveHandle, NurbsCurve, Polyline>,
    surfaces: Objects<SurfaceHandle, NurbsSurface, TriangleMesh>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::with_config(KernelConfig::default())
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed-resolution curve sampling and adaptive surface tessellation,
    /// both taken from `config.tessellation`.
    pub fn with_config(config: KernelConfig) -> Self {
        Self {
            sampling: Sampling::fixed_from_config(&config.tessellation),
            surface_sampling: SurfaceSampling::from_config(&config.tessellation),
            config,
            curves: RwLock::new(SlotMap::with_key()),
            surfaces: RwLock::new(SlotMap::with_key()),
        }
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = KernelConfig::from_json_file(path)?;
        info!("scene: loaded configuration {:?}", config);
        Ok(Self::with_config(config))
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    pub fn surface_sampling(&self) -> SurfaceSampling {
        self.surface_sampling
    }

    /// Change curve sampling; every cached polyline is dropped.
    pub fn set_sampling(&mut self, sampling: Sampling) -> Result<()> {
        sampling.validate()?;
        self.sampling = sampling;
        for entry in read(&self.curves).values() {
            lock(&read(entry).cache).invalidate();
        }
        debug!("scene: curve sampling set to {:?}", sampling);
        Ok(())
    }

    /// Change surface tessellation; every cached mesh is dropped.
    pub fn set_surface_sampling(&mut self, sampling: SurfaceSampling) -> Result<()> {
        sampling.validate()?;
        self.surface_sampling = sampling;
        for entry in read(&self.surfaces).values() {
            lock(&read(entry).cache).invalidate();
        }
        debug!("scene: surface sampling set to {:?}", sampling);
        Ok(())
    }

    // --- Construction ---

    pub fn new_curve(
        &self,
        degree: usize,
        points: Vec<Point3>,
        weights: Vec<f64>,
        scheme: &KnotScheme,
    ) -> Result<CurveHandle> {
        let curve = NurbsCurve::new(degree, points, weights, scheme)?;
        Ok(self.add_curve(curve))
    }

    pub fn add_curve(&self, curve: NurbsCurve) -> CurveHandle {
        let degree = curve.degree();
        let count = curve.control_point_count();
        let handle = write(&self.curves).insert(Entry::new(curve));
        info!(
            "scene: added curve {:?} (degree {}, {} control points)",
            handle, degree, count
        );
        handle
    }

    pub fn new_surface(
        &self,
        degree_u: usize,
        degree_v: usize,
        points: Vec<Vec<Point3>>,
        weights: Vec<Vec<f64>>,
    ) -> Result<SurfaceHandle> {
        let surface = NurbsSurface::new(degree_u, degree_v, points, weights)?;
        Ok(self.add_surface(surface))
    }

    pub fn add_surface(&self, surface: NurbsSurface) -> SurfaceHandle {
        let (rows, cols) = (surface.control_grid().rows(), surface.control_grid().cols());
        let handle = write(&self.surfaces).insert(Entry::new(surface));
        info!("scene: added surface {:?} ({}x{} control points)", handle, rows, cols);
        handle
    }

    pub fn remove_curve(&self, handle: CurveHandle) -> Result<()> {
        write(&self.curves)
            .remove(handle)
            .map(|_| info!("scene: removed curve {:?}", handle))
            .ok_or_else(|| curve_not_found(handle))
    }

    pub fn remove_surface(&self, handle: SurfaceHandle) -> Result<()> {
        write(&self.surfaces)
            .remove(handle)
            .map(|_| info!("scene: removed surface {:?}", handle))
            .ok_or_else(|| surface_not_found(handle))
    }

    pub fn curve_handles(&self) -> Vec<CurveHandle> {
        read(&self.curves).keys().collect()
    }

    pub fn surface_handles(&self) -> Vec<SurfaceHandle> {
        read(&self.surfaces).keys().collect()
    }

    pub fn curve_count(&self) -> usize {
        read(&self.curves).len()
    }

    pub fn surface_count(&self) -> usize {
        read(&self.surfaces).len()
    }

    // --- Access helpers ---

    fn curve_entry(&self, handle: CurveHandle) -> Result<Arc<RwLock<Entry<NurbsCurve, Polyline>>>> {
        read(&self.curves)
            .get(handle)
            .cloned()
            .ok_or_else(|| curve_not_found(handle))
    }

    fn surface_entry(
        &self,
        handle: SurfaceHandle,
    ) -> Result<Arc<RwLock<Entry<NurbsSurface, TriangleMesh>>>> {
        read(&self.surfaces)
            .get(handle)
            .cloned()
            .ok_or_else(|| surface_not_found(handle))
    }

    fn with_curve<R>(&self, handle: CurveHandle, f: impl FnOnce(&NurbsCurve) -> Result<R>) -> Result<R> {
        let entry = self.curve_entry(handle)?;
        let guard = read(&entry);
        f(&guard.geometry)
    }

    fn edit_curve<R>(
        &self,
        handle: CurveHandle,
        f: impl FnOnce(&mut NurbsCurve) -> Result<R>,
    ) -> Result<R> {
        let entry = self.curve_entry(handle)?;
        let mut guard = write(&entry);
        f(&mut guard.geometry).map_err(|err| {
            log_failed_edit(format_args!("curve {:?}", handle), &err);
            err
        })
    }

    fn with_surface<R>(
        &self,
        handle: SurfaceHandle,
        f: impl FnOnce(&NurbsSurface) -> Result<R>,
    ) -> Result<R> {
        let entry = self.surface_entry(handle)?;
        let guard = read(&entry);
        f(&guard.geometry)
    }

    fn edit_surface<R>(
        &self,
        handle: SurfaceHandle,
        f: impl FnOnce(&mut NurbsSurface) -> Result<R>,
    ) -> Result<R> {
        let entry = self.surface_entry(handle)?;
        let mut guard = write(&entry);
        f(&mut guard.geometry).map_err(|err| {
            log_failed_edit(format_args!("surface {:?}", handle), &err);
            err
        })
    }

    // --- Curve mutation ---

    pub fn move_point(&self, handle: CurveHandle, index: usize, position: Point3) -> Result<()> {
        self.edit_curve(handle, |c| c.move_point(index, position))
    }

    pub fn set_weight(&self, handle: CurveHandle, index: usize, weight: f64) -> Result<()> {
        self.edit_curve(handle, |c| c.set_weight(index, weight))
    }

    pub fn insert_knot_refine(&self, handle: CurveHandle, value: f64) -> Result<()> {
        self.edit_curve(handle, |c| c.insert_knot_refine(value).map(|_| ()))
    }

    pub fn degree_elevate(&self, handle: CurveHandle) -> Result<()> {
        self.edit_curve(handle, NurbsCurve::degree_elevate)
    }

    pub fn set_degree(&self, handle: CurveHandle, degree: usize) -> Result<()> {
        self.edit_curve(handle, |c| c.set_degree(degree))
    }

    pub fn set_knots(&self, handle: CurveHandle, knots: Vec<f64>) -> Result<()> {
        self.edit_curve(handle, |c| c.set_knots(knots))
    }

    // --- Surface mutation ---

    pub fn move_surface_point(
        &self,
        handle: SurfaceHandle,
        (i, j): (usize, usize),
        position: Point3,
    ) -> Result<()> {
        self.edit_surface(handle, |s| s.move_point(i, j, position))
    }

    pub fn set_surface_weight(
        &self,
        handle: SurfaceHandle,
        (i, j): (usize, usize),
        weight: f64,
    ) -> Result<()> {
        self.edit_surface(handle, |s| s.set_weight(i, j, weight))
    }

    pub fn insert_surface_knot_refine(
        &self,
        handle: SurfaceHandle,
        direction: Direction,
        value: f64,
    ) -> Result<()> {
        self.edit_surface(handle, |s| s.insert_knot_refine(direction, value).map(|_| ()))
    }

    pub fn surface_degree_elevate(&self, handle: SurfaceHandle, direction: Direction) -> Result<()> {
        self.edit_surface(handle, |s| s.degree_elevate(direction))
    }

    // --- Curve queries ---

    pub fn evaluate(&self, handle: CurveHandle, t: f64) -> Result<Point3> {
        self.with_curve(handle, |c| c.evaluate(t))
    }

    pub fn evaluate_derivative(&self, handle: CurveHandle, t: f64, order: usize) -> Result<Vector3> {
        self.with_curve(handle, |c| c.evaluate_derivative(t, order))
    }

    pub fn domain(&self, handle: CurveHandle) -> Result<(f64, f64)> {
        self.with_curve(handle, |c| Ok(c.domain()))
    }

    pub fn degree(&self, handle: CurveHandle) -> Result<usize> {
        self.with_curve(handle, |c| Ok(c.degree()))
    }

    pub fn control_point_count(&self, handle: CurveHandle) -> Result<usize> {
        self.with_curve(handle, |c| Ok(c.control_point_count()))
    }

    /// Copy of the control polygon, for the control-point table.
    pub fn control_points(&self, handle: CurveHandle) -> Result<Vec<ControlPoint>> {
        self.with_curve(handle, |c| Ok(c.control_net().points().to_vec()))
    }

    pub fn knots(&self, handle: CurveHandle) -> Result<Vec<f64>> {
        self.with_curve(handle, |c| Ok(c.knots().knots().to_vec()))
    }

    pub fn curve_generation(&self, handle: CurveHandle) -> Result<Generation> {
        self.with_curve(handle, |c| Ok(c.generation()))
    }

    /// Immutable copy for off-thread work.
    pub fn snapshot_curve(&self, handle: CurveHandle) -> Result<NurbsCurve> {
        self.with_curve(handle, |c| Ok(c.clone()))
    }

    // --- Surface queries ---

    pub fn evaluate_surface(&self, handle: SurfaceHandle, u: f64, v: f64) -> Result<Point3> {
        self.with_surface(handle, |s| s.evaluate(u, v))
    }

    pub fn evaluate_surface_derivative(
        &self,
        handle: SurfaceHandle,
        (u, v): (f64, f64),
        (order_u, order_v): (usize, usize),
    ) -> Result<Vector3> {
        self.with_surface(handle, |s| s.evaluate_derivative(u, v, order_u, order_v))
    }

    pub fn surface_normal(&self, handle: SurfaceHandle, u: f64, v: f64) -> Result<Vector3> {
        self.with_surface(handle, |s| s.normal(u, v))
    }

    pub fn surface_domain(&self, handle: SurfaceHandle) -> Result<((f64, f64), (f64, f64))> {
        self.with_surface(handle, |s| Ok((s.domain_u(), s.domain_v())))
    }

    pub fn surface_control_grid(&self, handle: SurfaceHandle) -> Result<ControlGrid> {
        self.with_surface(handle, |s| Ok(s.control_grid().clone()))
    }

    pub fn surface_knots(&self, handle: SurfaceHandle, direction: Direction) -> Result<Vec<f64>> {
        self.with_surface(handle, |s| Ok(s.knots(direction).knots().to_vec()))
    }

    pub fn surface_generation(&self, handle: SurfaceHandle) -> Result<Generation> {
        self.with_surface(handle, |s| Ok(s.generation()))
    }

    pub fn snapshot_surface(&self, handle: SurfaceHandle) -> Result<NurbsSurface> {
        self.with_surface(handle, |s| Ok(s.clone()))
    }

    /// Bounds of every control net in the scene.
    pub fn bounds(&self) -> Option<Aabb3> {
        let mut corners = Vec::new();
        for entry in read(&self.curves).values() {
            let (min, max) = read(entry).geometry.bounding_box();
            corners.extend([min, max]);
        }
        for entry in read(&self.surfaces).values() {
            let (min, max) = read(entry).geometry.bounding_box();
            corners.extend([min, max]);
        }
        Aabb3::from_points(corners)
    }

    // --- Rendering handoff ---

    /// Polyline for `handle`, recomputed only when the curve changed.
    pub fn tessellate_curve(&self, handle: CurveHandle) -> Result<Arc<Polyline>> {
        let entry = self.curve_entry(handle)?;
        let sampling = self.sampling;
        let guard = read(&entry);
        guard.tessellate(|c| tessellate_curve(c, sampling))
    }

    /// Mesh for `handle`, recomputed only when the surface changed.
    pub fn tessellate_surface(&self, handle: SurfaceHandle) -> Result<Arc<TriangleMesh>> {
        let entry = self.surface_entry(handle)?;
        let sampling = self.surface_sampling;
        let guard = read(&entry);
        guard.tessellate(|s| tessellate_surface(s, &sampling))
    }

    /// Tessellate every object on the rayon pool, reusing fresh cache entries.
    pub fn tessellate_all(&self) -> SceneTessellation {
        let curve_entries: Vec<_> = read(&self.curves)
            .iter()
            .map(|(h, e)| (h, Arc::clone(e)))
            .collect();
        let surface_entries: Vec<_> = read(&self.surfaces)
            .iter()
            .map(|(h, e)| (h, Arc::clone(e)))
            .collect();
        let sampling = self.sampling;
        let surface_sampling = self.surface_sampling;

        let (curves, surfaces): (Vec<_>, Vec<_>) = rayon::join(
            || {
                curve_entries
                    .par_iter()
                    .map(|(h, e)| (*h, read(e).tessellate(|c| tessellate_curve(c, sampling))))
                    .collect()
            },
            || {
                surface_entries
                    .par_iter()
                    .map(|(h, e)| {
                        (*h, read(e).tessellate(|s| tessellate_surface(s, &surface_sampling)))
                    })
                    .collect()
            },
        );
        for (h, e) in curves.iter().filter_map(|(h, r)| r.as_ref().err().map(|e| (h, e))) {
            warn!("scene: tessellation of curve {:?} failed: {}", h, e);
        }
        for (h, e) in surfaces.iter().filter_map(|(h, r)| r.as_ref().err().map(|e| (h, e))) {
            warn!("scene: tessellation of surface {:?} failed: {}", h, e);
        }
        debug!(
            "scene: tessellated {} curves and {} surfaces",
            curves.len(),
            surfaces.len()
        );
        SceneTessellation { curves, surfaces }
    }
}

/// Rejected input logs at debug level; any other failure is a warning.
fn log_failed_edit(target: std::fmt::Arguments<'_>, err: &KernelError) {
    if err.is_validation() {
        debug!("scene: rejected edit of {}: {}", target, err);
    } else {
        warn!("scene: edit of {} failed: {}", target, err);
    }
}

fn curve_not_found(handle: CurveHandle) -> KernelError {
    KernelError::NotFound(format!("curve {:?}", handle))
}

fn surface_not_found(handle: SurfaceHandle) -> KernelError {
    KernelError::NotFound(format!("surface {:?}", handle))
}
