/// Whether the host's game id belongs to one of `base_ids`.
///
/// Host ids append a variant digit to the base id (`54261` is base `5426`),
/// so a base groups a game with its beta build. A bare base id is accepted too.
pub fn is_supported_game(id: u32, base_ids: &[u32]) -> bool {
    base_ids.contains(&(id / 10)) || base_ids.contains(&id)
}
