use office_voice_types::inventory::ElectronicsType;
use office_voice_types::FunctionDeclaration;
use serde_json::json;

pub const CONTROL_DEVICE: &str = "controlDevice";
pub const CREATE_ROOM: &str = "createRoom";
pub const CREATE_ELECTRONICS: &str = "createElectronics";
pub const MAP_ELECTRONICS_TO_ROOM: &str = "mapElectronicsToRoom";

/// The functions the model may call during a session.
pub fn function_declarations() -> Vec<FunctionDeclaration> {
    let electronics_types: Vec<&str> = ElectronicsType::ALL.iter().map(|t| t.as_str()).collect();

    vec![
        FunctionDeclaration::new(
            CONTROL_DEVICE,
            "Sets the state of one or more electronic devices (e.g., light, AC) to ON or OFF.",
            json!({
                "type": "OBJECT",
                "properties": {
                    "deviceIds": {
                        "type": "ARRAY",
                        "items": { "type": "STRING" },
                        "description": "An array of unique identifiers for the devices to control."
                    },
                    "state": {
                        "type": "STRING",
                        "description": "The target state for the devices, must be either \"ON\" or \"OFF\".",
                        "enum": ["ON", "OFF"]
                    }
                },
                "required": ["deviceIds", "state"]
            }),
        ),
        FunctionDeclaration::new(
            CREATE_ROOM,
            "Creates a new room in the office. Use when the user asks to add or create a room.",
            json!({
                "type": "OBJECT",
                "properties": {
                    "roomName": {
                        "type": "STRING",
                        "description": "The name of the room to create, e.g. \"Conference Room\", \"MD Room 1\"."
                    }
                },
                "required": ["roomName"]
            }),
        ),
        FunctionDeclaration::new(
            CREATE_ELECTRONICS,
            "Creates a new electronic device in the office. Use when the user asks to add a light, AC, TV, or speaker.",
            json!({
                "type": "OBJECT",
                "properties": {
                    "electronicsName": {
                        "type": "STRING",
                        "description": "The name of the electronic device, e.g. \"Tube Light 1\", \"Split AC\"."
                    },
                    "type": {
                        "type": "STRING",
                        "description": "The type of electronic device.",
                        "enum": electronics_types
                    }
                },
                "required": ["electronicsName", "type"]
            }),
        ),
        FunctionDeclaration::new(
            MAP_ELECTRONICS_TO_ROOM,
            "Maps an existing electronic device to a room. Use when the user says to assign, connect, or put a device in a room.",
            json!({
                "type": "OBJECT",
                "properties": {
                    "roomName": {
                        "type": "STRING",
                        "description": "The name of the room to map the device to."
                    },
                    "electronicsName": {
                        "type": "STRING",
                        "description": "The name of the electronic device to map."
                    }
                },
                "required": ["roomName", "electronicsName"]
            }),
        ),
    ]
}
