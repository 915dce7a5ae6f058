/// Win percentage rounded to the nearest integer; 0 with no games played
pub fn win_rate(won: u32, played: u32) -> u32 {
    if played == 0 {
        return 0;
    }
    (won as f64 / played as f64 * 100.0).round() as u32
}

/// Display tier for a compatibility score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl CompatibilityTier {
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => CompatibilityTier::Excellent,
            60..=79 => CompatibilityTier::Good,
            40..=59 => CompatibilityTier::Fair,
            _ => CompatibilityTier::Poor,
        }
    }

    pub fn text_class(&self) -> &'static str {
        match self {
            CompatibilityTier::Excellent => "text-green-400",
            CompatibilityTier::Good => "text-yellow-400",
            CompatibilityTier::Fair => "text-orange-400",
            CompatibilityTier::Poor => "text-red-400",
        }
    }

    pub fn badge_class(&self) -> &'static str {
        match self {
            CompatibilityTier::Excellent => "bg-green-400/20 border-green-400",
            CompatibilityTier::Good => "bg-yellow-400/20 border-yellow-400",
            CompatibilityTier::Fair => "bg-orange-400/20 border-orange-400",
            CompatibilityTier::Poor => "bg-red-400/20 border-red-400",
        }
    }
}
