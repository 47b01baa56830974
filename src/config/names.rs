/// User-facing tank names, indexed by player session id
pub const TANK_NAMES: [&str; 50] = [
    "M10 tank destroyer",
    "Cruiser Mk I",
    "Crusader Mk III",
    "Jagdpanzer 38",
    "M3 Stuart",
    "M3 Lee",
    "M7 Priest",
    "M4 Sherman",
    "M18 Hellcat",
    "M22 Locust",
    "M24 Chaffee",
    "M26 Pershing",
    "M36 tank destroyer",
    "Marder III",
    "Matilda II",
    "Panzer I",
    "Panzer V Panther",
    "Panzer IV",
    "Panzer VI Tiger I",
    "Ram medium tank",
    "Sherman Firefly",
    "SU-76",
    "SU-85",
    "SU-100",
    "SU-122",
    "T-37A",
    "T-60",
    "T-72",
    "Type 97 Chi-Ha",
    "Valentine tank Mk III",
    "M48 Patton",
    "M60 Patton",
    "Type 61",
    "M1 Abrams",
    "Chieftain",
    "Challenger 1",
    "Merkava Mk III",
    "M2 Bradley",
    "K2 Black Panther",
    "Leopard 2",
    "Centurion Mk3",
    "Stridsvagn 122",
    "Arjun MBT",
    "K1 88",
    "Panzer 68",
    "Stridsvagn 103",
    "Schneider CA1",
    "Renault FT",
    "Char 2C",
    "Vickers Mk I",
];
