use slotmap::new_key_type;

new_key_type! {
    /// Stable reference to a curve owned by a [`Scene`](crate::Scene).
    pub struct CurveHandle;
    /// Stable reference to a surface owned by a [`Scene`](crate::Scene).
    pub struct SurfaceHandle;
}
