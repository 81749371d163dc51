use bitflags::bitflags;

/// Percussion categories. The set is closed: charts and the engine agree on
/// these four and nothing registers more at runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Drum {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
}

impl Drum {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [Self::Kick, Self::Snare, Self::ClosedHat, Self::OpenHat];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn mask(self) -> DrumMask {
        DrumMask::from_bits_retain(1 << (self as u32))
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Kick),
            1 => Some(Self::Snare),
            2 => Some(Self::ClosedHat),
            3 => Some(Self::OpenHat),
            _ => None,
        }
    }

    /// File name prefix of this drum's recorded variants (`k0.wav`, `k1.wav`, ...).
    pub const fn asset_prefix(self) -> &'static str {
        match self {
            Self::Kick => "k",
            Self::Snare => "s",
            Self::ClosedHat => "h",
            Self::OpenHat => "o",
        }
    }
}

bitflags! {
    /// Set of drums fired (or required) at one instant. Bit `n` is
    /// `Drum::from_index(n)`, which is also the instrument number in charts.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DrumMask: u32 {
        const KICK = 1 << 0;
        const SNARE = 1 << 1;
        const CLOSED_HAT = 1 << 2;
        const OPEN_HAT = 1 << 3;
    }
}

impl DrumMask {
    /// Drums in this mask, in `Drum::ALL` order.
    pub fn drums(self) -> impl Iterator<Item = Drum> {
        Drum::ALL.into_iter().filter(move |d| self.contains(d.mask()))
    }
}

impl From<Drum> for DrumMask {
    fn from(drum: Drum) -> Self {
        drum.mask()
    }
}
