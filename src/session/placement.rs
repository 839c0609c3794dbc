/// Which way a menu unfolds from its trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropdownDirection {
    Down,
    Up,
}

/// Open upward only when the menu does not fit below the trigger and there
/// is more room above it than below.
pub fn dropdown_direction(
    trigger_top: f64,
    trigger_bottom: f64,
    viewport_height: f64,
    menu_height: f64,
) -> DropdownDirection {
    let space_below = viewport_height - trigger_bottom;
    let space_above = trigger_top;

    if space_below < menu_height && space_above > space_below {
        DropdownDirection::Up
    } else {
        DropdownDirection::Down
    }
}
