/// Stefan-Boltzmann constant [W m^-2 K^-4].
pub const STEFAN_BOLTZMANN: f64 = 5.670_374_419e-8;
/// Speed of light in vacuum [m s^-1].
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Solar flux at 1 au [W m^-2].
pub const SOLAR_CONSTANT: f64 = 1366.0;
/// Astronomical unit [m].
pub const AU: f64 = 1.495_978_707e11;

/// Minimum distance along a ray for an intersection to count. Rays start on a
/// facet centroid, so hits closer than this are the facet itself.
pub const RAYCAST_MINIMUM_DISTANCE: f64 = 1e-9;
/// Determinant threshold below which a ray is treated as parallel to a triangle.
pub const RAY_PARALLEL_EPSILON: f64 = 1e-12;
/// Height above a facet plane [m] below which a point counts as coplanar.
pub const COPLANAR_TOLERANCE: f64 = 1e-9;
/// Facets with an area below this are degenerate.
pub const MIN_FACET_AREA: f64 = 1e-14;
/// Tolerance on the view-factor row sum before a supplied list is rejected.
pub const VIEW_FACTOR_SUM_TOLERANCE: f64 = 1e-6;
/// Input power below which the conservation ratio is undefined [W].
pub const E_IN_EPSILON: f64 = 1e-12;

/// Largest stable explicit diffusion number.
pub const MAX_STABILITY_NUMBER: f64 = 0.5;
/// Iteration cap for the surface energy-balance Newton solve.
pub const NEWTON_MAX_ITER: usize = 30;
/// Relative convergence tolerance for the Newton solve.
pub const NEWTON_TOLERANCE: f64 = 1e-10;
