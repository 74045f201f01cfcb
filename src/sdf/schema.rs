//! Prim type and model kind tables.

/// Prim types that carry a transform.
pub const XFORMABLE_TYPES: &[&str] = &[
    "Xform",
    "Mesh",
    "Points",
    "BasisCurves",
    "NurbsCurves",
    "NurbsPatch",
    "Cube",
    "Sphere",
    "Cylinder",
    "Cone",
    "Capsule",
    "Plane",
    "Camera",
    "PointInstancer",
    "SkelRoot",
    "Skeleton",
    "SphereLight",
    "DistantLight",
    "RectLight",
    "DiskLight",
    "CylinderLight",
    "DomeLight",
];

/// Renderable geometry types.
pub const GPRIM_TYPES: &[&str] = &[
    "Mesh",
    "Points",
    "BasisCurves",
    "NurbsCurves",
    "NurbsPatch",
    "Cube",
    "Sphere",
    "Cylinder",
    "Cone",
    "Capsule",
    "Plane",
];

/// Plain container types removed by empty pruning.
pub const CONTAINER_TYPES: &[&str] = &["Xform", "Scope"];

/// Check if a prim type is transformable.
pub fn is_xformable(type_name: &str) -> bool {
    XFORMABLE_TYPES.contains(&type_name)
}

/// Check if a prim type is a gprim.
pub fn is_gprim(type_name: &str) -> bool {
    GPRIM_TYPES.contains(&type_name)
}

/// Check if a prim type is a plain container.
pub fn is_container(type_name: &str) -> bool {
    CONTAINER_TYPES.contains(&type_name)
}

/// Model kind tokens.
pub mod kind {
    pub const MODEL: &str = "model";
    pub const GROUP: &str = "group";
    pub const ASSEMBLY: &str = "assembly";
    pub const COMPONENT: &str = "component";
    pub const SUBCOMPONENT: &str = "subcomponent";

    /// Base kind of a registered kind.
    fn base(kind: &str) -> Option<&'static str> {
        match kind {
            GROUP => Some(MODEL),
            ASSEMBLY => Some(GROUP),
            COMPONENT => Some(MODEL),
            _ => None,
        }
    }

    /// Check whether `kind` is `base` or derives from it.
    pub fn is_a(kind: &str, base_kind: &str) -> bool {
        let mut cur = Some(kind);
        while let Some(k) = cur {
            if k == base_kind {
                return true;
            }
            cur = base(k);
        }
        false
    }

    /// Models are `model` and everything derived from it.
    pub fn is_model(kind: &str) -> bool {
        is_a(kind, MODEL)
    }

    /// Check for a known kind token.
    pub fn is_known(kind: &str) -> bool {
        matches!(kind, MODEL | GROUP | ASSEMBLY | COMPONENT | SUBCOMPONENT)
    }
}
