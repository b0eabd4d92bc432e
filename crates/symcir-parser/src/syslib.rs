//! Embedded system library: prototypes of the expansion models.

/// Netlist text of the system library.
///
/// Each built-in expansion model (`D`, `QV`, `MV`, `OV`, `OC`) is a
/// `.subckt` of the same name whose formals are the model parameters.
pub const SYSTEM_LIBRARY: &str = "\
symcir system library
* Small-signal diode: conductance in parallel with junction capacitance
.subckt D a c gd=0 cd=0
Gd a c a c {gd}
Cd a c {cd}
.ends

* Small-signal bipolar transistor (hybrid-pi)
.subckt QV c b e gm=0 gpi=0 cpi=0 cbc=0 go=0
Gpi b e b e {gpi}
Cpi b e {cpi}
Cbc b c {cbc}
Gm c e b e {gm}
Go c e c e {go}
.ends

* Small-signal MOS transistor
.subckt MV d g s b gm=0 go=0 gb=0 cgs=0 cgd=0
Cgs g s {cgs}
Cgd g d {cgd}
Gm d s g s {gm}
Gb d s b s {gb}
Go d s d s {go}
.ends

* Voltage-feedback operational amplifier
.subckt OV inP inN outP outN av=1e5 zo=0 cd=0
Cd inP inN {cd}
Eo outP outN inP inN EZ value={av} zo={zo}
.ends

* Transconductance operational amplifier
.subckt OC inP inN outP outN gm=1 cd=0
Cd inP inN {cd}
Go outP outN inP inN {gm}
.ends
.end
";
