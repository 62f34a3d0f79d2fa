//! Product capability table

/// Vendor id of the only known vendor
pub const VENDOR: u32 = 1;

/// Capabilities that change how a device is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Features {
    pub color: bool,
    /// Supports the extended multizone messages
    pub multizone: bool,
    /// Tile chain made of pixel matrices
    pub matrix: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub id: u32,
    pub name: &'static str,
    pub features: Features,
}

const WHITE: Features = Features {
    color: false,
    multizone: false,
    matrix: false,
};

const COLOR: Features = Features {
    color: true,
    multizone: false,
    matrix: false,
};

const MULTIZONE: Features = Features {
    color: true,
    multizone: true,
    matrix: false,
};

const MATRIX: Features = Features {
    color: true,
    multizone: false,
    matrix: true,
};

macro_rules! products {
    ($($id:literal => $name:literal: $features:ident,)*) => {
        &[$(Product { id: $id, name: $name, features: $features },)*]
    };
}

static PRODUCTS: &[Product] = products! {
    1 => "Original 1000": COLOR,
    3 => "Color 650": COLOR,
    10 => "White 800 (Low Voltage)": WHITE,
    11 => "White 800 (High Voltage)": WHITE,
    15 => "Color 1000": COLOR,
    18 => "White 900 BR30 (Low Voltage)": WHITE,
    20 => "Color 1000 BR30": COLOR,
    22 => "Color 1000": COLOR,
    27 => "A19": COLOR,
    28 => "BR30": COLOR,
    29 => "A19 Night Vision": COLOR,
    30 => "BR30 Night Vision": COLOR,
    // Only the legacy multizone messages
    31 => "Z": COLOR,
    32 => "Z": MULTIZONE,
    36 => "Downlight": COLOR,
    37 => "Downlight": COLOR,
    38 => "Beam": MULTIZONE,
    43 => "A19": COLOR,
    44 => "BR30": COLOR,
    45 => "A19 Night Vision": COLOR,
    46 => "BR30 Night Vision": COLOR,
    49 => "Mini Color": COLOR,
    50 => "Mini White to Warm": WHITE,
    51 => "Mini White": WHITE,
    52 => "GU10": COLOR,
    55 => "Tile": MATRIX,
    57 => "Candle": MATRIX,
    59 => "Mini Color": COLOR,
    60 => "Mini White to Warm": WHITE,
    61 => "Mini White": WHITE,
    62 => "A19": COLOR,
    63 => "BR30": COLOR,
    64 => "A19 Night Vision": COLOR,
    65 => "BR30 Night Vision": COLOR,
    68 => "Candle": MATRIX,
    81 => "Candle White to Warm": WHITE,
    82 => "Filament Clear": WHITE,
    85 => "Filament Amber": WHITE,
    87 => "Mini White": WHITE,
    88 => "Mini White": WHITE,
    90 => "Clean": COLOR,
    91 => "Color": COLOR,
    92 => "Color": COLOR,
    94 => "BR30": COLOR,
    96 => "Candle White to Warm": WHITE,
    97 => "A19": COLOR,
    98 => "BR30": COLOR,
    99 => "Clean": COLOR,
    100 => "Filament Clear": WHITE,
    101 => "Filament Amber": WHITE,
    109 => "A19 Night Vision": COLOR,
    110 => "BR30 Night Vision": COLOR,
    111 => "A19 Night Vision": COLOR,
    112 => "BR30 Night Vision": COLOR,
    117 => "Z": MULTIZONE,
    118 => "Z": MULTIZONE,
    119 => "Beam": MULTIZONE,
    120 => "Beam": MULTIZONE,
    123 => "Color": COLOR,
    124 => "Color": COLOR,
    125 => "White to Warm": WHITE,
    126 => "White to Warm": WHITE,
    127 => "White": WHITE,
    128 => "White": WHITE,
    129 => "Color": COLOR,
    130 => "Color": COLOR,
    137 => "Candle Color": MATRIX,
    138 => "Candle Color": MATRIX,
    141 => "Neon": MULTIZONE,
    142 => "Neon": MULTIZONE,
    143 => "String": MULTIZONE,
    144 => "String": MULTIZONE,
    161 => "Outdoor Neon": MULTIZONE,
    162 => "Outdoor Neon": MULTIZONE,
    176 => "Ceiling": MATRIX,
    177 => "Ceiling": MATRIX,
};

/// Look up a product by its vendor and product id
pub fn lookup(vendor: u32, product: u32) -> Option<&'static Product> {
    if vendor != VENDOR {
        return None;
    }

    PRODUCTS.iter().find(|p| p.id == product)
}
