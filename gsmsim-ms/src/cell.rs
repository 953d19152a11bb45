//! Serving cell view
//!
//! Owned by the cell selection process and read by MM. Holds the camping
//! status, the serving cell's location area and barring data, and the
//! forbidden location area list.

use std::fmt;

use gsmsim_common::Lai;
use tracing::info;

use crate::primitives::SysInfo;

/// Camping status reported by cell selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CampStatus {
    #[default]
    NotCamped,
    /// Camped on a suitable cell
    Normally,
    /// Camped on an acceptable cell (limited service)
    AnyCell,
}

/// Class bits that do not take part in the access check (class 10,
/// emergency calls).
const ACCESS_CLASS_MASK: u16 = 0xfbff;

/// What MM needs to know about the serving cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServingCell {
    pub camp: CampStatus,
    pub lai: Lai,
    /// Cell barred for access
    pub cell_barr: bool,
    /// Barred access classes, bit N = class N
    pub class_barr: u16,
    /// System information 3 has been received
    pub si3: bool,
    /// IMSI attach/detach allowed on this cell
    pub att_allowed: bool,
    forbidden_las: Vec<Lai>,
}

impl ServingCell {
    /// A normally camped cell in `lai` without any barring.
    pub fn camped(lai: Lai) -> Self {
        Self {
            camp: CampStatus::Normally,
            lai,
            ..Self::default()
        }
    }

    /// Move to a newly selected cell. The forbidden location area list
    /// survives reselection; the entries of `cell` itself are dropped.
    pub fn reselect(&mut self, cell: ServingCell) {
        let forbidden_las = std::mem::take(&mut self.forbidden_las);
        *self = Self {
            forbidden_las,
            ..cell
        };
    }

    pub fn camped_normally(&self) -> bool {
        self.camp == CampStatus::Normally
    }

    pub fn camped_any(&self) -> bool {
        self.camp != CampStatus::NotCamped
    }

    /// Apply the barring and attach fields of a system information update.
    pub fn apply_sysinfo(&mut self, sysinfo: &SysInfo) {
        self.si3 = sysinfo.si3;
        self.att_allowed = sysinfo.att_allowed;
        self.cell_barr = sysinfo.cell_barr;
        self.class_barr = sysinfo.class_barr;
    }

    /// Access check of TS 04.08 4.4.4.1 for a subscriber with the given
    /// access classes. `acc_barr` overrides the barring.
    pub fn access_barred(&self, access_class: u16, acc_barr: bool) -> bool {
        if acc_barr {
            return false;
        }
        self.cell_barr || (access_class & ACCESS_CLASS_MASK) & (self.class_barr ^ 0xffff) == 0
    }

    pub fn is_la_forbidden(&self, lai: &Lai) -> bool {
        self.forbidden_las.contains(lai)
    }

    pub fn add_forbidden_la(&mut self, lai: Lai) {
        if !self.is_la_forbidden(&lai) {
            info!("Adding LA {} to forbidden list", lai);
            self.forbidden_las.push(lai);
        }
    }

    pub fn remove_forbidden_la(&mut self, lai: &Lai) {
        self.forbidden_las.retain(|l| l != lai);
    }

    pub fn forbidden_las(&self) -> &[Lai] {
        &self.forbidden_las
    }
}

impl fmt::Display for ServingCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.camp {
            CampStatus::NotCamped => write!(f, "not camped"),
            CampStatus::Normally => write!(f, "camped normally in {}", self.lai),
            CampStatus::AnyCell => write!(f, "camped on any cell in {}", self.lai),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsmsim_common::Plmn;

    fn lai() -> Lai {
        Lai::new(Plmn::new(262, 42, false), 100)
    }

    #[test]
    fn test_access_allowed() {
        let cell = ServingCell::camped(lai());
        assert!(!cell.access_barred(0x0001, false));
    }

    #[test]
    fn test_cell_barred() {
        let mut cell = ServingCell::camped(lai());
        cell.cell_barr = true;
        assert!(cell.access_barred(0x0001, false));
        assert!(!cell.access_barred(0x0001, true));
    }

    #[test]
    fn test_class_barred() {
        let mut cell = ServingCell::camped(lai());
        cell.class_barr = 0x0001;
        assert!(cell.access_barred(0x0001, false));
        assert!(!cell.access_barred(0x0003, false));
        // class 10 alone never grants access
        assert!(cell.access_barred(0x0400, false));
    }

    #[test]
    fn test_forbidden_las() {
        let mut cell = ServingCell::camped(lai());
        cell.add_forbidden_la(lai());
        assert!(cell.is_la_forbidden(&lai()));
        cell.remove_forbidden_la(&lai());
        assert!(cell.forbidden_las().is_empty());
    }

    #[test]
    fn test_reselect_keeps_forbidden_las() {
        let mut cell = ServingCell::camped(lai());
        cell.cell_barr = true;
        cell.add_forbidden_la(lai());

        let other = Lai::new(Plmn::new(262, 42, false), 101);
        cell.reselect(ServingCell::camped(other));
        assert_eq!(cell.lai, other);
        assert!(!cell.cell_barr);
        assert!(cell.is_la_forbidden(&lai()));
    }

    #[test]
    fn test_camping() {
        let mut cell = ServingCell::default();
        assert!(!cell.camped_any());
        cell.camp = CampStatus::AnyCell;
        assert!(cell.camped_any());
        assert!(!cell.camped_normally());
    }
}
