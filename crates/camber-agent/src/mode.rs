//! Operating modes: free-form modeling vs robot-module generation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    General,
    Robot,
}

impl Mode {
    /// Greeting turn seeded into a fresh transcript
    pub fn greeting(&self) -> &'static str {
        match self {
            Mode::General => {
                "Hello! I am your OpenSCAD agent. Describe a 3D model, and I will generate the code for you."
            }
            Mode::Robot => {
                "Hello! I am your Robot Module Creator. Describe a modular robot part, and I will generate the code using standardized connectors."
            }
        }
    }

    /// Source seeded into a fresh artifact store
    pub fn seed_code(&self) -> &'static str {
        match self {
            Mode::General => GENERAL_SEED,
            Mode::Robot => ROBOT_SEED,
        }
    }

    /// System instruction for generation, with the current source embedded
    /// so the model edits in context
    pub fn system_instruction(&self, current_code: &str) -> String {
        let rules = match self {
            Mode::General => GENERAL_INSTRUCTION,
            Mode::Robot => ROBOT_INSTRUCTION,
        };
        format!("{rules}\n\nCurrent Code:\n{current_code}")
    }

    pub fn is_robot(&self) -> bool {
        matches!(self, Mode::Robot)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::General => write!(f, "general"),
            Mode::Robot => write!(f, "robot"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Mode::General),
            "robot" => Ok(Mode::Robot),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

const GENERAL_SEED: &str = "// Generated OpenSCAD code will appear here\ncube([10, 10, 10], center=true);\n";

const ROBOT_SEED: &str = r#"include <module_connector.scad>

length = 50;

// Module connectors at both ends
translate([0,0,length])
module_connector();

translate([0,0,-6])
module_connector();

// Main body
difference(){
    cylinder(length, 40/2, 40/2, $fn=100);

    // Cut for assembly
    cube([length*2, 0.1, length*2], true);

              //Screw holes
          for(i=[0:1])
          mirror([i,0,0])
          translate([40/2,-2.5,length/2])
          rotate([90,0,0]){
              cylinder(length, d=15);
              translate([-3,0,-1])
              cylinder(2, d1=3.1, d2=6);

              #translate([-3,0,-25])
              cylinder(50, d=3.1);

              translate([-4,-3,-5-2.8])
              cube([10,5.8,2.8]);
          }
}
"#;

const GENERAL_INSTRUCTION: &str = r#"You are an expert OpenSCAD programmer.
Your task is to generate OpenSCAD code based on the user's description.
- Return ONLY the OpenSCAD code.
- Do not include markdown backticks or explanations.
- Ensure the code is valid.
- Use '$fn=100' for smooth circles/spheres unless low poly is requested.
- Always center objects unless requested otherwise."#;

const ROBOT_INSTRUCTION: &str = r#"You are an expert OpenSCAD programmer specializing in modular robot parts.
Your task is to generate OpenSCAD code for robot modules based on the user's description.

IMPORTANT RULES:
- ALWAYS include "include <module_connector.scad>" at the top of the code
- Use module_connector() to add standardized connectors at connection points
- Connectors are typically placed at opposite ends of the module
- Return ONLY the OpenSCAD code without markdown backticks or explanations
- Ensure the code is valid OpenSCAD
- Use '$fn=100' for smooth circles/spheres unless low poly is requested
- Include assembly cuts (thin cube cuts) to make 3D printing easier
- Add screw holes for assembly when appropriate

EXAMPLE REFERENCE (from example_robot_module.scad):
include <module_connector.scad>

length = 50;

// Module connectors at both ends
translate([0,0,length])
module_connector();

translate([0,0,-6])
module_connector();

// Main body with assembly features
difference(){
    cylinder(length, 40/2, 40/2, $fn=100);
    cube([length*2, 0.1, length*2], true); // assembly cut each connector need to have one

    //Screw holes
    for(i=[0:1])
    mirror([i,0,0])
    translate([40/2,-2.5,length/2])
    rotate([90,0,0]){
        cylinder(length, d=15);
        translate([-3,0,-1])
        cylinder(2, d1=3.1, d2=6);

        #translate([-3,0,-25])
        cylinder(50, d=3.1);

        translate([-4,-3,-5-2.8])
        cube([10,5.8,2.8]);
    }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greetings_name_their_specialty() {
        assert!(Mode::General.greeting().contains("OpenSCAD agent"));
        assert!(Mode::Robot.greeting().contains("Robot Module Creator"));
    }

    #[test]
    fn general_seed_is_a_centered_cube() {
        let seed = Mode::General.seed_code();
        assert!(seed.contains("cube([10, 10, 10], center=true);"));
    }

    #[test]
    fn robot_seed_includes_the_connector_library() {
        let seed = Mode::Robot.seed_code();
        assert!(seed.starts_with("include <module_connector.scad>"));
        assert!(seed.contains("module_connector();"));
    }

    #[test]
    fn system_instruction_embeds_the_current_code() {
        let instruction = Mode::General.system_instruction("sphere(4);");
        assert!(instruction.contains("Current Code:\nsphere(4);"));
        assert!(instruction.contains("expert OpenSCAD programmer"));
    }

    #[test]
    fn robot_instruction_mandates_the_connector_include() {
        let instruction = Mode::Robot.system_instruction("");
        assert!(instruction.contains(r#"ALWAYS include "include <module_connector.scad>""#));
        assert!(instruction.contains("EXAMPLE REFERENCE"));
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Robot".parse::<Mode>().unwrap(), Mode::Robot);
        assert_eq!("GENERAL".parse::<Mode>().unwrap(), Mode::General);
        assert!("car".parse::<Mode>().is_err());
    }
}
