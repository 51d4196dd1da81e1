//! Explicit leapfrog update of the electromagnetic fields and of the divergence-cleaning
//! scalars `F` (for E) and `G` (for B).
//!
//! In cylindrical geometry component `0` of every field is azimuthal mode 0, then each higher
//! mode `m` stores its real part in component `2m - 1` and its imaginary part in `2m`.

use tracing::Level;

use crate::{
    constants,
    field::{g_field_type, FieldView, MeshField, VectorField},
    geometry::{Geometry, IndexType},
    stencil::{
        CartesianCkc, CartesianNodal, CartesianYee, CylindricalYee, FdtdAlgo, GridType, Stencil,
        StencilCoefficients, StencilKind,
    },
    PicError, Real,
};

/// Azimuthal mode stored in one field component.
#[derive(Clone, Copy, Debug)]
struct Mode<F> {
    index: usize,
    m: F,
    // component holding the other (real or imaginary) part of the same mode
    partner: usize,
    // +1 for a real part, -1 for an imaginary part
    sign: F,
}

impl<F: Real> Mode<F> {
    fn of(comp: usize) -> Self {
        if comp == 0 {
            return Self {
                index: 0,
                m: F::ZERO,
                partner: 0,
                sign: F::ONE,
            };
        }
        let index = (comp + 1) / 2;
        let real = comp % 2 == 1;
        Self {
            index,
            m: F::from_f64(index as f64),
            partner: if real { comp + 1 } else { comp - 1 },
            sign: if real { F::ONE } else { -F::ONE },
        }
    }

    // ±m value/r coupling to the partner component; zero for mode 0
    #[inline(always)]
    fn azimuthal(&self, partner_value: F, r: F) -> F {
        if self.index == 0 {
            F::ZERO
        } else {
            self.sign * self.m * partner_value / r
        }
    }
}

/// Finite-difference Maxwell solver of one refinement level.
#[derive(Clone, Debug)]
pub struct FiniteDifferenceSolver<F: Real> {
    kind: StencilKind,
    algo: FdtdAlgo,
    grid_type: GridType,
    coefs: StencilCoefficients<F>,
    geom: Geometry<F>,
    nmodes: usize,
    tile_planes: usize,
}

impl<F: Real> FiniteDifferenceSolver<F> {
    pub fn new(
        algo: FdtdAlgo,
        grid_type: GridType,
        geom: &Geometry<F>,
        nmodes: usize,
    ) -> Result<Self, PicError> {
        let kind = StencilKind::select(algo, grid_type, geom.coords)?;
        let cylindrical = geom.coords.is_cylindrical();
        if (cylindrical && nmodes == 0) || (!cylindrical && nmodes != 1) {
            return Err(PicError::InvalidModeCount(nmodes));
        }

        tracing::event!(
            Level::DEBUG,
            "field solver: `{}` stencil, {} cells, d = {:?}",
            kind.name(),
            geom.n_cell.iter().product::<usize>(),
            geom.cell_size
        );

        Ok(Self {
            kind,
            algo,
            grid_type,
            coefs: kind.coefficients(geom),
            geom: geom.clone(),
            nmodes,
            tile_planes: 8,
        })
    }

    /// Thickness, in index planes, of the slabs updated by one task.
    pub fn with_tile_planes(mut self, tile_planes: usize) -> Self {
        self.tile_planes = tile_planes.max(1);
        self
    }

    pub fn kind(&self) -> StencilKind {
        self.kind
    }

    pub fn algo(&self) -> FdtdAlgo {
        self.algo
    }

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn geometry(&self) -> &Geometry<F> {
        &self.geom
    }

    pub fn coefficients(&self) -> &StencilCoefficients<F> {
        &self.coefs
    }

    pub fn nmodes(&self) -> usize {
        self.nmodes
    }

    /// Components of every field: `2 nmodes - 1` in cylindrical geometry, 1 otherwise.
    pub fn ncomp(&self) -> usize {
        2 * self.nmodes - 1
    }

    pub fn compute_max_dt(&self) -> F {
        self.kind.compute_max_dt(&self.geom, self.nmodes)
    }

    pub fn max_guard_cells(&self) -> usize {
        self.kind.max_guard_cells()
    }

    fn check_field(&self, field: &MeshField<F>, source: bool) -> Result<(), PicError> {
        field.check_ncomp(self.ncomp())?;
        if field.domain_box() != self.geom.domain_box() {
            return Err(PicError::MeshMismatch {
                a: field.name().to_string(),
                b: "solver geometry".to_string(),
            });
        }
        if source {
            field.check_guard_cells([self.max_guard_cells(); 3])?;
        }
        Ok(())
    }

    fn check_vector(&self, field: &VectorField<F>, source: bool) -> Result<(), PicError> {
        field
            .comps()
            .iter()
            .try_for_each(|c| self.check_field(c, source))
    }

    fn check_same_type(&self, a: &MeshField<F>, b: &MeshField<F>) -> Result<(), PicError> {
        if a.ix_type() != b.ix_type() {
            return Err(PicError::MeshMismatch {
                a: a.name().to_string(),
                b: b.name().to_string(),
            });
        }
        Ok(())
    }

    fn check_g(&self, g: &MeshField<F>, source: bool) -> Result<(), PicError> {
        self.check_field(g, source)?;
        if g.ix_type() != g_field_type(self.grid_type) {
            return Err(PicError::MeshMismatch {
                a: g.name().to_string(),
                b: format!("{:?} B", self.grid_type),
            });
        }
        Ok(())
    }

    /// `B -= dt curl E`, plus `dt grad G` when `g` is given.
    pub fn evolve_b(
        &self,
        b: &mut VectorField<F>,
        e: &VectorField<F>,
        g: Option<&MeshField<F>>,
        dt: F,
    ) -> Result<(), PicError> {
        self.check_vector(b, false)?;
        self.check_vector(e, true)?;
        if let Some(g) = g {
            self.check_g(g, true)?;
        }
        tracing::event!(Level::TRACE, "evolve B over dt = {:e}", dt);

        match self.kind {
            StencilKind::CartesianYee => self.evolve_b_cartesian::<CartesianYee>(b, e, g, dt),
            StencilKind::CartesianCkc => self.evolve_b_cartesian::<CartesianCkc>(b, e, g, dt),
            StencilKind::CartesianNodal => self.evolve_b_cartesian::<CartesianNodal>(b, e, g, dt),
            StencilKind::CylindricalYee => {
                if g.is_some() {
                    return Err(PicError::UnsupportedOperation {
                        operation: "divergence cleaning of B",
                        coords: self.geom.coords,
                    });
                }
                self.evolve_b_cylindrical(b, e, dt)
            }
        }
        Ok(())
    }

    /// `E += c² dt curl B - μ0 c² dt J`, plus `c² dt grad F` when `f` is given.
    pub fn evolve_e(
        &self,
        e: &mut VectorField<F>,
        b: &VectorField<F>,
        j: &VectorField<F>,
        f: Option<&MeshField<F>>,
        dt: F,
    ) -> Result<(), PicError> {
        self.check_vector(e, false)?;
        self.check_vector(b, true)?;
        self.check_vector(j, false)?;
        for d in 0..3 {
            self.check_same_type(&e[d], &j[d])?;
        }
        if let Some(f) = f {
            self.check_field(f, true)?;
        }
        tracing::event!(Level::TRACE, "evolve E over dt = {:e}", dt);

        match self.kind {
            StencilKind::CartesianYee => self.evolve_e_cartesian::<CartesianYee>(e, b, j, f, dt),
            StencilKind::CartesianCkc => self.evolve_e_cartesian::<CartesianCkc>(e, b, j, f, dt),
            StencilKind::CartesianNodal => self.evolve_e_cartesian::<CartesianNodal>(e, b, j, f, dt),
            StencilKind::CylindricalYee => self.evolve_e_cylindrical(e, b, j, f, dt),
        }
        Ok(())
    }

    /// `F += dt (div E - ρ/ε0)`.
    pub fn evolve_f(
        &self,
        f: &mut MeshField<F>,
        e: &VectorField<F>,
        rho: Option<&MeshField<F>>,
        dt: F,
    ) -> Result<(), PicError> {
        self.check_field(f, false)?;
        self.check_vector(e, true)?;
        if let Some(rho) = rho {
            self.check_field(rho, false)?;
            self.check_same_type(f, rho)?;
        }
        tracing::event!(Level::TRACE, "evolve F over dt = {:e}", dt);

        match self.kind {
            StencilKind::CartesianYee => self.evolve_f_cartesian::<CartesianYee>(f, e, rho, dt),
            StencilKind::CartesianCkc => self.evolve_f_cartesian::<CartesianCkc>(f, e, rho, dt),
            StencilKind::CartesianNodal => self.evolve_f_cartesian::<CartesianNodal>(f, e, rho, dt),
            StencilKind::CylindricalYee => self.evolve_f_cylindrical(f, e, rho, dt),
        }
        Ok(())
    }

    /// `G += c² dt div B`.
    pub fn evolve_g(&self, g: &mut MeshField<F>, b: &VectorField<F>, dt: F) -> Result<(), PicError> {
        self.check_g(g, false)?;
        self.check_vector(b, true)?;
        tracing::event!(Level::TRACE, "evolve G over dt = {:e}", dt);

        match self.kind {
            StencilKind::CartesianYee => self.evolve_g_cartesian::<CartesianYee>(g, b, dt),
            StencilKind::CartesianCkc => self.evolve_g_cartesian::<CartesianCkc>(g, b, dt),
            StencilKind::CartesianNodal => self.evolve_g_cartesian::<CartesianNodal>(g, b, dt),
            StencilKind::CylindricalYee => {
                return Err(PicError::UnsupportedOperation {
                    operation: "divergence cleaning of B",
                    coords: self.geom.coords,
                })
            }
        }
        Ok(())
    }

    fn evolve_b_cartesian<S: Stencil<F>>(
        &self,
        b: &mut VectorField<F>,
        e: &VectorField<F>,
        g: Option<&MeshField<F>>,
        dt: F,
    ) {
        let c = &self.coefs;
        let [ex, ey, ez] = [0, 1, 2].map(|d| e[d].view(0));
        let g = g.map(|g| g.view(0));
        let [bx, by, bz] = b.comps_mut();

        bx.par_update_valid(0, self.tile_planes, |i, j, k, old| {
            let mut v = old - dt * (S::upward_dy(ez, c, i, j, k) - S::upward_dz(ey, c, i, j, k));
            if let Some(g) = g {
                v += dt * S::downward_dx(g, c, i, j, k);
            }
            v
        });
        by.par_update_valid(0, self.tile_planes, |i, j, k, old| {
            let mut v = old - dt * (S::upward_dz(ex, c, i, j, k) - S::upward_dx(ez, c, i, j, k));
            if let Some(g) = g {
                v += dt * S::downward_dy(g, c, i, j, k);
            }
            v
        });
        bz.par_update_valid(0, self.tile_planes, |i, j, k, old| {
            let mut v = old - dt * (S::upward_dx(ey, c, i, j, k) - S::upward_dy(ex, c, i, j, k));
            if let Some(g) = g {
                v += dt * S::downward_dz(g, c, i, j, k);
            }
            v
        });
    }

    fn evolve_e_cartesian<S: Stencil<F>>(
        &self,
        e: &mut VectorField<F>,
        b: &VectorField<F>,
        j: &VectorField<F>,
        f: Option<&MeshField<F>>,
        dt: F,
    ) {
        let c = &self.coefs;
        let c2dt = F::from_f64(constants::C * constants::C) * dt;
        let mu0 = F::from_f64(constants::MU0);
        let [bx, by, bz] = [0, 1, 2].map(|d| b[d].view(0));
        let [jx, jy, jz] = [0, 1, 2].map(|d| j[d].view(0));
        let f = f.map(|f| f.view(0));
        let [ex, ey, ez] = e.comps_mut();

        ex.par_update_valid(0, self.tile_planes, |i, j, k, old| {
            let curl = S::downward_dy(bz, c, i, j, k) - S::downward_dz(by, c, i, j, k);
            let mut v = old + c2dt * (curl - mu0 * jx.at(i, j, k));
            if let Some(f) = f {
                v += c2dt * S::upward_dx(f, c, i, j, k);
            }
            v
        });
        ey.par_update_valid(0, self.tile_planes, |i, j, k, old| {
            let curl = S::downward_dz(bx, c, i, j, k) - S::downward_dx(bz, c, i, j, k);
            let mut v = old + c2dt * (curl - mu0 * jy.at(i, j, k));
            if let Some(f) = f {
                v += c2dt * S::upward_dy(f, c, i, j, k);
            }
            v
        });
        ez.par_update_valid(0, self.tile_planes, |i, j, k, old| {
            let curl = S::downward_dx(by, c, i, j, k) - S::downward_dy(bx, c, i, j, k);
            let mut v = old + c2dt * (curl - mu0 * jz.at(i, j, k));
            if let Some(f) = f {
                v += c2dt * S::upward_dz(f, c, i, j, k);
            }
            v
        });
    }

    fn evolve_f_cartesian<S: Stencil<F>>(
        &self,
        f: &mut MeshField<F>,
        e: &VectorField<F>,
        rho: Option<&MeshField<F>>,
        dt: F,
    ) {
        let c = &self.coefs;
        let inv_ep0 = F::from_f64(1.0 / constants::EP0);
        let [ex, ey, ez] = [0, 1, 2].map(|d| e[d].view(0));
        let rho = rho.map(|rho| rho.view(0));

        f.par_update_valid(0, self.tile_planes, |i, j, k, old| {
            let div = S::downward_dx(ex, c, i, j, k)
                + S::downward_dy(ey, c, i, j, k)
                + S::downward_dz(ez, c, i, j, k);
            let mut v = old + dt * div;
            if let Some(rho) = rho {
                v -= dt * inv_ep0 * rho.at(i, j, k);
            }
            v
        });
    }

    fn evolve_g_cartesian<S: Stencil<F>>(&self, g: &mut MeshField<F>, b: &VectorField<F>, dt: F) {
        let c = &self.coefs;
        let c2dt = F::from_f64(constants::C * constants::C) * dt;
        let [bx, by, bz] = [0, 1, 2].map(|d| b[d].view(0));

        g.par_update_valid(0, self.tile_planes, |i, j, k, old| {
            let div = S::upward_dx(bx, c, i, j, k)
                + S::upward_dy(by, c, i, j, k)
                + S::upward_dz(bz, c, i, j, k);
            old + c2dt * div
        });
    }

    fn evolve_b_cylindrical(&self, b: &mut VectorField<F>, e: &VectorField<F>, dt: F) {
        type Cyl = CylindricalYee;
        let c = &self.coefs;
        let geom = &self.geom;
        let dr = geom.cell_size[0];
        let [br, bt, bz] = b.comps_mut();

        for comp in 0..self.ncomp() {
            let mode = Mode::<F>::of(comp);
            let [er, et, ez] = [0, 1, 2].map(|d| e[d].view(comp));
            let [er_p, ez_p] = [e[0].view(mode.partner), e[2].view(mode.partner)];

            // Br: nodal r, cell z
            br.par_update_valid(comp, self.tile_planes, |i, j, k, old| {
                let r = geom.position(0, i, IndexType::Node);
                if r != F::ZERO {
                    old + dt * (Cyl::upward_dz(et, c, i, j, k) - mode.azimuthal(ez_p.at(i, j, k), r))
                } else if mode.index == 1 {
                    // Ez is linear in r near the axis for m = 1
                    old + dt * (Cyl::upward_dz(et, c, i, j, k) - mode.azimuthal(ez_p.at(i + 1, j, k), dr))
                } else {
                    F::ZERO
                }
            });

            // Btheta: cell r, cell z
            bt.par_update_valid(comp, self.tile_planes, |i, j, k, old| {
                old + dt * (Cyl::upward_dr(ez, c, i, j, k) - Cyl::upward_dz(er, c, i, j, k))
            });

            // Bz: cell r, nodal z
            bz.par_update_valid(comp, self.tile_planes, |i, j, k, old| {
                let r = geom.position(0, i, IndexType::Cell);
                old + dt
                    * (mode.azimuthal(er_p.at(i, j, k), r)
                        - Cyl::upward_drr_over_r(et, r, dr, c, i, j, k))
            });
        }
    }

    fn evolve_e_cylindrical(
        &self,
        e: &mut VectorField<F>,
        b: &VectorField<F>,
        j: &VectorField<F>,
        f: Option<&MeshField<F>>,
        dt: F,
    ) {
        type Cyl = CylindricalYee;
        let c = &self.coefs;
        let geom = &self.geom;
        let dr = geom.cell_size[0];
        let c2dt = F::from_f64(constants::C * constants::C) * dt;
        let mu0 = F::from_f64(constants::MU0);
        let [er, et, ez] = e.comps_mut();

        for comp in 0..self.ncomp() {
            let mode = Mode::<F>::of(comp);
            let [br, bt, bz] = [0, 1, 2].map(|d| b[d].view(comp));
            let [br_p, bz_p] = [b[0].view(mode.partner), b[2].view(mode.partner)];
            let [jr, jt, jz] = [0, 1, 2].map(|d| j[d].view(comp));
            let f_c: Option<FieldView<'_, F>> = f.map(|f| f.view(comp));
            let f_p = f.map(|f| f.view(mode.partner));

            // Er: cell r, nodal z
            er.par_update_valid(comp, self.tile_planes, |i, j, k, old| {
                let r = geom.position(0, i, IndexType::Cell);
                let mut v = old
                    + c2dt
                        * (-Cyl::downward_dz(bt, c, i, j, k) + mode.azimuthal(bz_p.at(i, j, k), r)
                            - mu0 * jr.at(i, j, k));
                if let Some(f) = f_c {
                    v += c2dt * Cyl::upward_dr(f, c, i, j, k);
                }
                v
            });

            // Etheta: nodal r, nodal z; on axis it follows the freshly updated Er
            let er_p = er.view(mode.partner);
            et.par_update_valid(comp, self.tile_planes, |i, j, k, old| {
                let r = geom.position(0, i, IndexType::Node);
                if r != F::ZERO {
                    let mut v = old
                        + c2dt
                            * (-Cyl::downward_dr(bz, c, i, j, k) + Cyl::downward_dz(br, c, i, j, k)
                                - mu0 * jt.at(i, j, k));
                    if let Some(f) = f_p {
                        v += c2dt * mode.azimuthal(f.at(i, j, k), r);
                    }
                    v
                } else if mode.index == 1 {
                    // Etheta(r=0, m=1) = -i Er(r=dr/2, m=1)
                    let mut v = mode.sign * er_p.at(i, j, k);
                    if let Some(f) = f_p {
                        v += c2dt * mode.azimuthal(f.at(i + 1, j, k), dr);
                    }
                    v
                } else {
                    F::ZERO
                }
            });

            // Ez: nodal r, cell z
            ez.par_update_valid(comp, self.tile_planes, |i, j, k, old| {
                let r = geom.position(0, i, IndexType::Node);
                if r == F::ZERO && mode.index > 0 {
                    return F::ZERO;
                }
                let azimuthal = if r == F::ZERO {
                    F::ZERO
                } else {
                    mode.azimuthal(br_p.at(i, j, k), r)
                };
                let mut v = old
                    + c2dt
                        * (-azimuthal + Cyl::downward_drr_over_r(bt, r, dr, c, i, j, k)
                            - mu0 * jz.at(i, j, k));
                if let Some(f) = f_c {
                    v += c2dt * Cyl::upward_dz(f, c, i, j, k);
                }
                v
            });
        }
    }

    fn evolve_f_cylindrical(
        &self,
        f: &mut MeshField<F>,
        e: &VectorField<F>,
        rho: Option<&MeshField<F>>,
        dt: F,
    ) {
        type Cyl = CylindricalYee;
        let c = &self.coefs;
        let geom = &self.geom;
        let dr = geom.cell_size[0];
        let inv_ep0 = F::from_f64(1.0 / constants::EP0);

        for comp in 0..self.ncomp() {
            let mode = Mode::<F>::of(comp);
            let [er, ez] = [e[0].view(comp), e[2].view(comp)];
            let et_p = e[1].view(mode.partner);
            let rho = rho.map(|rho| rho.view(comp));

            f.par_update_valid(comp, self.tile_planes, |i, j, k, old| {
                let r = geom.position(0, i, IndexType::Node);
                if r == F::ZERO && mode.index > 0 {
                    return F::ZERO;
                }
                let azimuthal = if r == F::ZERO {
                    F::ZERO
                } else {
                    mode.azimuthal(et_p.at(i, j, k), r)
                };
                let div = Cyl::downward_drr_over_r(er, r, dr, c, i, j, k)
                    + azimuthal
                    + Cyl::downward_dz(ez, c, i, j, k);
                let mut v = old + dt * div;
                if let Some(rho) = rho {
                    v -= dt * inv_ep0 * rho.at(i, j, k);
                }
                v
            });
        }
    }
}
