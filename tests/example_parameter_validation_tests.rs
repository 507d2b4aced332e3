#[cfg(test)]
mod tests {
    use glob::glob;
    use newton_fractal::fractals::newtons_method::{NewtonsMethodParams, NewtonsMethodSystem};
    use std::fs;

    fn parse_all_parameter_files_or_panic(directory: &str) -> Vec<NewtonsMethodParams> {
        let pattern = format!("{}/**/*.json", directory);
        let mut all_params = Vec::new();

        // Each match must (1) open, (2) parse, and (3) pass validation.
        for entry in glob(&pattern).expect("Failed to read glob pattern") {
            let path = entry.unwrap_or_else(|e| panic!("Failed to read path: {:?}", e));
            let content = fs::read_to_string(&path)
                .unwrap_or_else(|_| panic!("Failed to read file: {:?}", path));

            let params: NewtonsMethodParams = serde_json::from_str(&content)
                .unwrap_or_else(|err| panic!("Failed to parse JSON file: {:?}.\n\n{:?}\n", path, err));
            if let Err(err) = params.validate() {
                panic!("Invalid parameters in {:?}: {}", path, err);
            }
            all_params.push(params);
        }
        all_params
    }

    #[test]
    fn test_ensure_all_demo_files_can_be_parsed() {
        let all_params = parse_all_parameter_files_or_panic("demos");
        assert!(!all_params.is_empty(), "no parameter files found under demos/");

        for params in all_params {
            let system = NewtonsMethodSystem::from_expression(&params.expression, &params.root_solver)
                .unwrap_or_else(|err| panic!("`{}`: {}", params.expression, err));
            // Distinct roots only: at most one per degree.
            assert!(!system.roots.is_empty());
            assert!(system.roots.len() <= system.function.degree());
        }
    }
}
