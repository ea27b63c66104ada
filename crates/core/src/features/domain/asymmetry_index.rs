/// Per-frame facial asymmetry measurements, in feature-matrix column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AsymmetryIndex {
    /// Smile movement: mouth-corner displacement since the previous frame.
    Smm,
    /// Dynamic mouth symmetry of the lower-lip contour.
    Dms,
    /// Eye opening asymmetry, right over left.
    Eoa,
    /// Nose tip horizontal movement.
    Ns,
    /// Jaw (chin) horizontal movement.
    Ja,
    /// Facial contour asymmetry between the cheek outlines.
    Fca,
    /// Lip asymmetry around the contour centre.
    La,
    /// Eyebrow raise asymmetry.
    Era,
    /// Smile corner angle difference.
    Sca,
    /// Head tilt angle through the upper lids, in degrees.
    Hta,
    /// Eye closure index.
    Eci,
}

pub const INDEX_COUNT: usize = 11;

impl AsymmetryIndex {
    pub const ALL: [AsymmetryIndex; INDEX_COUNT] = [
        AsymmetryIndex::Smm,
        AsymmetryIndex::Dms,
        AsymmetryIndex::Eoa,
        AsymmetryIndex::Ns,
        AsymmetryIndex::Ja,
        AsymmetryIndex::Fca,
        AsymmetryIndex::La,
        AsymmetryIndex::Era,
        AsymmetryIndex::Sca,
        AsymmetryIndex::Hta,
        AsymmetryIndex::Eci,
    ];

    pub const fn column(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            AsymmetryIndex::Smm => "SMM",
            AsymmetryIndex::Dms => "DMS",
            AsymmetryIndex::Eoa => "EOA",
            AsymmetryIndex::Ns => "NS",
            AsymmetryIndex::Ja => "JA",
            AsymmetryIndex::Fca => "FCA",
            AsymmetryIndex::La => "LA",
            AsymmetryIndex::Era => "ERA",
            AsymmetryIndex::Sca => "SCA",
            AsymmetryIndex::Hta => "HTA",
            AsymmetryIndex::Eci => "ECI",
        }
    }

    /// Movement indices compare against the previous landmark set.
    pub const fn needs_previous(self) -> bool {
        matches!(
            self,
            AsymmetryIndex::Smm | AsymmetryIndex::Ns | AsymmetryIndex::Ja
        )
    }
}

impl std::fmt::Display for AsymmetryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
